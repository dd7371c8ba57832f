//! Answering service coordinating extraction, chunking, embedding, retrieval, and generation.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, OllamaEmbeddingClient},
    llm::{ChatCompletionClient, CompletionClient},
    metrics::{MetricsSnapshot, RagMetrics},
    pdf::{self, Page},
    pipeline::{
        chunking::chunk_text,
        prompt::build_prompt,
        types::{
            Answer, AskError, LLM_FAILURE_ANSWER, NO_CONTEXT_ANSWER, UploadError, UploadOutcome,
        },
    },
    qdrant::{ChunkPoint, QdrantService, VectorIndex},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Tunables injected into the service at construction time.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum characters per chunk.
    pub chunk_max_length: usize,
    /// Character overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of nearest chunks retrieved per question.
    pub top_k: usize,
    /// Directory where uploaded PDF files are persisted.
    pub upload_dir: PathBuf,
}

impl PipelineSettings {
    /// Build settings from the loaded process configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            chunk_max_length: config.chunk_max_length,
            chunk_overlap: config.chunk_overlap,
            top_k: config.search_top_k,
            upload_dir: PathBuf::from(&config.upload_dir),
        }
    }
}

/// Coordinates the full question answering pipeline.
///
/// The service owns long-lived handles to the embedding client, vector index, completion
/// client, and metrics registry. All collaborators are passed in at construction so tests can
/// substitute fakes; [`RagService::initialize`] wires up the production components. Construct
/// the service once near process start and share it through an `Arc`.
pub struct RagService {
    embedding_client: Box<dyn EmbeddingClient>,
    vector_index: Box<dyn VectorIndex>,
    completion_client: Box<dyn CompletionClient>,
    settings: PipelineSettings,
    metrics: Arc<RagMetrics>,
}

/// Abstraction over the answering pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Validate, persist, extract, chunk, embed, and index an uploaded document.
    async fn ingest_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome, UploadError>;

    /// Answer a question against a previously uploaded document.
    async fn answer_question(
        &self,
        question: &str,
        document_id: &str,
    ) -> Result<Answer, AskError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagService {
    /// Build a service from explicitly constructed collaborators.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient>,
        vector_index: Box<dyn VectorIndex>,
        completion_client: Box<dyn CompletionClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedding_client,
            vector_index,
            completion_client,
            settings,
            metrics: Arc::new(RagMetrics::new()),
        }
    }

    /// Build the production service, initializing backing services as needed.
    pub async fn initialize() -> Result<Self, UploadError> {
        tracing::info!("Initializing embedding client");
        let embedding_client = Box::new(OllamaEmbeddingClient::from_config());
        let completion_client = Box::new(ChatCompletionClient::from_config());
        let qdrant_service = QdrantService::new()?;
        qdrant_service.ensure_ready().await?;

        Ok(Self::new(
            embedding_client,
            Box::new(qdrant_service),
            completion_client,
            PipelineSettings::from_config(),
        ))
    }

    /// Run the upload pipeline for a single document.
    pub async fn ingest_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome, UploadError> {
        if !has_pdf_extension(filename) {
            return Err(UploadError::UnsupportedFileType {
                filename: filename.to_string(),
            });
        }

        let document_id = Uuid::new_v4().to_string();
        tracing::info!(document_id = %document_id, filename, "Processing upload");

        self.store_upload(&document_id, &bytes).await?;

        let pages = tokio::task::spawn_blocking(move || pdf::extract_pdf(&bytes))
            .await
            .map_err(|err| {
                crate::pdf::PdfError::Extraction(format!("extraction task failed: {err}"))
            })??;

        if pages.is_empty() {
            tracing::warn!(document_id = %document_id, "Upload contained no extractable text");
            return Err(UploadError::NoExtractableText);
        }

        self.index_pages(&document_id, &pages).await
    }

    /// Chunk, embed, and index extracted pages under the given document id.
    async fn index_pages(
        &self,
        document_id: &str,
        pages: &[Page],
    ) -> Result<UploadOutcome, UploadError> {
        let text = pdf::concatenate_pages(pages);
        let chunks = chunk_text(
            &text,
            self.settings.chunk_max_length,
            self.settings.chunk_overlap,
        )?;

        let embeddings = self
            .embedding_client
            .generate_embeddings(chunks.clone())
            .await?;
        debug_assert_eq!(chunks.len(), embeddings.len());

        let points: Vec<ChunkPoint> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, vector))| ChunkPoint {
                chunk_index,
                text,
                vector,
            })
            .collect();

        let chunks_stored = self.vector_index.upsert_chunks(document_id, points).await?;
        self.metrics.record_document(chunks_stored as u64);
        tracing::info!(
            document_id,
            pages = pages.len(),
            chunks = chunks_stored,
            "Document indexed"
        );

        Ok(UploadOutcome {
            document_id: document_id.to_string(),
            pages: pages.len(),
            chunks_stored,
        })
    }

    /// Answer a question by retrieving context and invoking the completion provider.
    pub async fn answer_question(
        &self,
        question: &str,
        document_id: &str,
    ) -> Result<Answer, AskError> {
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(AskError::EmptyEmbedding)?;

        let hits = self
            .vector_index
            .search_chunks(vector, document_id, self.settings.top_k)
            .await?;
        self.metrics.record_question();

        if hits.is_empty() {
            tracing::debug!(document_id, "No chunks found for document");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let sources: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
        tracing::debug!(document_id, retrieved = sources.len(), "Context retrieved");

        let prompt = build_prompt(question, &sources);
        match self.completion_client.complete(&prompt).await {
            Ok(answer) => Ok(Answer { answer, sources }),
            Err(error) => {
                tracing::warn!(document_id, error = %error, "Completion provider failed");
                Ok(Answer {
                    answer: LLM_FAILURE_ANSWER.to_string(),
                    sources,
                })
            }
        }
    }

    /// Return the current server metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn store_upload(&self, document_id: &str, bytes: &[u8]) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.settings.upload_dir).await?;
        let path = self.settings.upload_dir.join(format!("{document_id}.pdf"));
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(document_id, path = %path.display(), "Upload persisted");
        Ok(())
    }
}

fn has_pdf_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome, UploadError> {
        RagService::ingest_document(self, filename, bytes).await
    }

    async fn answer_question(
        &self,
        question: &str,
        document_id: &str,
    ) -> Result<Answer, AskError> {
        RagService::answer_question(self, question, document_id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingClientError};
    use crate::llm::{CompletionClient, CompletionClientError};
    use crate::qdrant::{QdrantError, ScoredChunk};
    use std::sync::Mutex;

    struct FakeEmbedding;

    #[async_trait]
    impl EmbeddingClient for FakeEmbedding {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        upserts: Mutex<Vec<(String, Vec<ChunkPoint>)>>,
        hits: Vec<ScoredChunk>,
        searches: Mutex<Vec<(String, usize)>>,
    }

    impl FakeIndex {
        fn with_hits(hits: Vec<ScoredChunk>) -> Self {
            Self {
                hits,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn ensure_ready(&self) -> Result<(), QdrantError> {
            Ok(())
        }

        async fn upsert_chunks(
            &self,
            document_id: &str,
            chunks: Vec<ChunkPoint>,
        ) -> Result<usize, QdrantError> {
            let count = chunks.len();
            self.upserts
                .lock()
                .expect("lock")
                .push((document_id.to_string(), chunks));
            Ok(count)
        }

        async fn search_chunks(
            &self,
            _vector: Vec<f32>,
            document_id: &str,
            top_k: usize,
        ) -> Result<Vec<ScoredChunk>, QdrantError> {
            self.searches
                .lock()
                .expect("lock")
                .push((document_id.to_string(), top_k));
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }
    }

    struct FakeCompletion {
        reply: Result<String, ()>,
        calls: Mutex<usize>,
    }

    impl FakeCompletion {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionClientError> {
            *self.calls.lock().expect("lock") += 1;
            self.reply
                .clone()
                .map_err(|()| CompletionClientError::GenerationFailed("provider down".into()))
        }
    }

    fn test_settings() -> PipelineSettings {
        PipelineSettings {
            chunk_max_length: 50,
            chunk_overlap: 10,
            top_k: 3,
            upload_dir: std::env::temp_dir().join("ragchat-test-uploads"),
        }
    }

    fn scored(id: &str, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk_id: id.to_string(),
            score,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_before_any_storage() {
        let index = Arc::new(FakeIndex::default());
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(SharedIndex(index.clone())),
            Box::new(FakeCompletion::answering("unused")),
            test_settings(),
        );

        let error = service
            .ingest_document("notes.txt", b"plain text".to_vec())
            .await
            .expect_err("non-PDF rejected");

        assert!(matches!(error, UploadError::UnsupportedFileType { .. }));
        assert!(error.is_client_error());
        assert!(index.upserts.lock().expect("lock").is_empty());
        assert_eq!(service.metrics_snapshot().documents_indexed, 0);
    }

    /// Build a well-formed single-page PDF whose page carries no content stream, so
    /// extraction succeeds but yields no text.
    fn blank_pdf() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"%PDF-1.4\n");

        let objects = [
            "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n",
            "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n",
            "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>\nendobj\n",
        ];
        let mut offsets = Vec::new();
        for object in objects {
            offsets.push(bytes.len());
            bytes.extend_from_slice(object.as_bytes());
        }

        let xref_start = bytes.len();
        bytes.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for offset in offsets {
            bytes.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        bytes.extend_from_slice(
            format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n")
                .as_bytes(),
        );
        bytes
    }

    #[tokio::test]
    async fn textless_pdf_is_rejected_before_indexing() {
        let index = Arc::new(FakeIndex::default());
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(SharedIndex(index.clone())),
            Box::new(FakeCompletion::answering("unused")),
            test_settings(),
        );

        let error = service
            .ingest_document("blank.pdf", blank_pdf())
            .await
            .expect_err("textless PDF rejected");

        assert!(matches!(error, UploadError::NoExtractableText));
        assert!(error.is_client_error());
        assert!(index.upserts.lock().expect("lock").is_empty());
        assert_eq!(service.metrics_snapshot().documents_indexed, 0);
    }

    #[tokio::test]
    async fn extension_check_is_case_insensitive() {
        assert!(has_pdf_extension("Report.PDF"));
        assert!(has_pdf_extension("report.pdf"));
        assert!(!has_pdf_extension("report.txt"));
        assert!(!has_pdf_extension("report"));
    }

    #[tokio::test]
    async fn indexing_pages_stores_ordered_chunks() {
        let index = Arc::new(FakeIndex::default());
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(SharedIndex(index.clone())),
            Box::new(FakeCompletion::answering("unused")),
            test_settings(),
        );

        let pages = vec![
            Page {
                number: 1,
                text: "The quick brown fox jumps over the lazy dog.".repeat(3),
            },
            Page {
                number: 2,
                text: "Pack my box with five dozen liquor jugs.".to_string(),
            },
        ];

        let outcome = service
            .index_pages("doc-1", &pages)
            .await
            .expect("indexing succeeds");

        assert_eq!(outcome.document_id, "doc-1");
        assert_eq!(outcome.pages, 2);
        assert!(outcome.chunks_stored > 1);

        let upserts = index.upserts.lock().expect("lock");
        assert_eq!(upserts.len(), 1);
        let (document_id, points) = &upserts[0];
        assert_eq!(document_id, "doc-1");
        let indices: Vec<usize> = points.iter().map(|point| point.chunk_index).collect();
        assert_eq!(indices, (0..points.len()).collect::<Vec<_>>());
        assert!(points.iter().all(|point| point.vector.len() == 3));

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_indexed, 1);
        assert_eq!(snapshot.chunks_indexed, outcome.chunks_stored as u64);
    }

    #[tokio::test]
    async fn empty_retrieval_returns_fixed_answer_with_no_sources() {
        let completion = Arc::new(FakeCompletion::answering("should not be called"));
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(FakeIndex::default()),
            Box::new(SharedCompletion(completion.clone())),
            test_settings(),
        );

        let answer = service
            .answer_question("What is the refund policy?", "missing-doc")
            .await
            .expect("fallback answer");

        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(*completion.calls.lock().expect("lock"), 0);
    }

    #[tokio::test]
    async fn completion_failure_returns_fallback_with_retrieved_sources() {
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(FakeIndex::with_hits(vec![
                scored("doc-1_0", 0.9, "first chunk"),
                scored("doc-1_1", 0.8, "second chunk"),
            ])),
            Box::new(FakeCompletion::failing()),
            test_settings(),
        );

        let answer = service
            .answer_question("What happened?", "doc-1")
            .await
            .expect("fallback answer, not an error");

        assert_eq!(answer.answer, LLM_FAILURE_ANSWER);
        assert_eq!(answer.sources, vec!["first chunk", "second chunk"]);
    }

    #[tokio::test]
    async fn answers_use_top_k_sources_in_ranked_order() {
        let index = Arc::new(FakeIndex::with_hits(vec![
            scored("doc-1_0", 0.9, "chunk a"),
            scored("doc-1_1", 0.8, "chunk b"),
            scored("doc-1_2", 0.7, "chunk c"),
            scored("doc-1_3", 0.6, "chunk d"),
            scored("doc-1_4", 0.5, "chunk e"),
        ]));
        let service = RagService::new(
            Box::new(FakeEmbedding),
            Box::new(SharedIndex(index.clone())),
            Box::new(FakeCompletion::answering("The generated answer.")),
            test_settings(),
        );

        let answer = service
            .answer_question("What is the refund policy?", "doc-1")
            .await
            .expect("answer");

        assert_eq!(answer.answer, "The generated answer.");
        assert_eq!(answer.sources, vec!["chunk a", "chunk b", "chunk c"]);

        let searches = index.searches.lock().expect("lock");
        assert_eq!(searches.as_slice(), &[("doc-1".to_string(), 3)]);
        assert_eq!(service.metrics_snapshot().questions_answered, 1);
    }

    /// Adapter so a shared fake can be observed after being boxed into the service.
    struct SharedIndex(Arc<FakeIndex>);

    #[async_trait]
    impl VectorIndex for SharedIndex {
        async fn ensure_ready(&self) -> Result<(), QdrantError> {
            self.0.ensure_ready().await
        }

        async fn upsert_chunks(
            &self,
            document_id: &str,
            chunks: Vec<ChunkPoint>,
        ) -> Result<usize, QdrantError> {
            self.0.upsert_chunks(document_id, chunks).await
        }

        async fn search_chunks(
            &self,
            vector: Vec<f32>,
            document_id: &str,
            top_k: usize,
        ) -> Result<Vec<ScoredChunk>, QdrantError> {
            self.0.search_chunks(vector, document_id, top_k).await
        }
    }

    struct SharedCompletion(Arc<FakeCompletion>);

    #[async_trait]
    impl CompletionClient for SharedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionClientError> {
            self.0.complete(prompt).await
        }
    }
}
