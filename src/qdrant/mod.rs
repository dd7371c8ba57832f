//! Qdrant vector store integration.
//!
//! The orchestration layer only depends on the narrow [`VectorIndex`] trait (embed-and-store,
//! filtered nearest-neighbor search) so it can be exercised against an in-memory fake. The
//! production implementation is a thin HTTP wrapper over the Qdrant REST API.

mod client;
mod filters;
mod payload;
mod types;

use async_trait::async_trait;

pub use client::QdrantService;
pub use types::{ChunkPoint, QdrantError, ScoredChunk};

/// Narrow interface over the vector store used by the answering pipeline.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Prepare the backing collection for reads and writes.
    async fn ensure_ready(&self) -> Result<(), QdrantError>;

    /// Store chunk vectors for a document, returning the number of points written.
    async fn upsert_chunks(
        &self,
        document_id: &str,
        chunks: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError>;

    /// Retrieve up to `top_k` nearest chunks belonging to the given document.
    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        document_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QdrantError>;
}
