//! Core data types and error definitions for the answering pipeline.

use crate::{embedding::EmbeddingClientError, pdf::PdfError, qdrant::QdrantError};
use thiserror::Error;

/// Fixed answer returned when no chunks exist for the requested document.
pub const NO_CONTEXT_ANSWER: &str = "No context found for this document.";

/// Fixed answer returned when the completion provider fails.
pub const LLM_FAILURE_ANSWER: &str = "Error calling LLM. Check API key, model, and network.";

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunking configured an impossible window size.
    #[error("chunk max length must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would prevent the window from ever advancing.
    #[error("chunk overlap ({overlap}) must be smaller than max length ({max_length})")]
    OverlapTooLarge {
        /// Configured overlap in characters.
        overlap: usize,
        /// Configured maximum chunk length in characters.
        max_length: usize,
    },
}

/// Errors emitted by the document upload pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Uploaded file does not carry a `.pdf` extension.
    #[error("Only PDF files are supported, got '{filename}'")]
    UnsupportedFileType {
        /// Name of the rejected file as supplied by the client.
        filename: String,
    },
    /// PDF parsed but produced no extractable text.
    #[error("No extractable text found in the uploaded PDF")]
    NoExtractableText,
    /// PDF could not be parsed at all.
    #[error("Failed to extract text: {0}")]
    Pdf(#[from] PdfError),
    /// Uploaded file could not be persisted to disk.
    #[error("Failed to store uploaded file: {0}")]
    Storage(#[from] std::io::Error),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store interaction failed during ingestion.
    #[error("Vector store request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

impl UploadError {
    /// Whether the failure was caused by client input rather than the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileType { .. } | Self::NoExtractableText | Self::Pdf(_)
        )
    }
}

/// Errors emitted while answering a question.
///
/// Completion-provider failures are absent on purpose: they are converted into the
/// [`LLM_FAILURE_ANSWER`] fallback with the retrieved context attached.
#[derive(Debug, Error)]
pub enum AskError {
    /// Embedding provider failed to return a vector for the question.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store search request failed.
    #[error("Vector store request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Embedding provider returned no vectors for the question.
    #[error("Embedding provider returned no vectors for the question")]
    EmptyEmbedding,
}

/// Summary of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Generated identifier assigned to the document.
    pub document_id: String,
    /// Number of pages with extractable text.
    pub pages: usize,
    /// Number of chunks stored in the vector index.
    pub chunks_stored: usize,
}

/// Answer produced for a chat question, together with its supporting context.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Generated (or fallback) answer text.
    pub answer: String,
    /// Chunk texts used as context, in retrieval order.
    pub sources: Vec<String>,
}
