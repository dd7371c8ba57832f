//! HTTP surface for ragchat.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `GET /` – Liveness message.
//! - `POST /upload` – Accept a multipart PDF upload, extract per-page text, chunk it, embed the
//!   chunks, and persist them in the vector index. Returns the generated document identifier
//!   plus page and chunk counts.
//! - `POST /chat` – Answer a question against a previously uploaded document, returning the
//!   generated answer and the chunk texts used as context.
//! - `GET /metrics` – Observe ingestion and query counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Client input errors (wrong file type, unextractable PDF, malformed multipart body) map to
//! 400 responses with a human-readable message; pipeline faults map to 500.

use crate::pipeline::{AskError, RagApi, UploadError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload body, in bytes.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the HTTP router exposing the question answering API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(health))
        .route("/upload", post(upload_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "RAG chat API is running" }))
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Generated identifier assigned to the uploaded document.
    document_id: String,
    /// Number of pages with extractable text.
    pages: usize,
    /// Number of chunks stored in the vector index.
    chunks_stored: usize,
}

/// Accept a multipart PDF upload and run the ingestion pipeline.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("File field is missing a filename".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("Failed to read upload: {err}")))?;

        let outcome = service.ingest_document(&filename, bytes.to_vec()).await?;
        tracing::info!(
            document_id = %outcome.document_id,
            pages = outcome.pages,
            chunks = outcome.chunks_stored,
            "Upload request completed"
        );
        return Ok(Json(UploadResponse {
            document_id: outcome.document_id,
            pages: outcome.pages,
            chunks_stored: outcome.chunks_stored,
        }));
    }

    Err(AppError::BadRequest(
        "Multipart body must contain a 'file' field".into(),
    ))
}

/// Request body for the `POST /chat` endpoint.
#[derive(Deserialize)]
struct ChatRequest {
    /// Natural-language question to answer.
    question: String,
    /// Identifier of the document to answer against.
    document_id: String,
}

/// Success response for the `POST /chat` endpoint.
#[derive(Serialize)]
struct ChatResponse {
    /// Generated (or fallback) answer text.
    answer: String,
    /// Chunk texts used as context, in retrieval order.
    sources: Vec<String>,
}

/// Answer a question against an uploaded document.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: RagApi,
{
    let answer = service
        .answer_question(&request.question, &request.document_id)
        .await?;
    tracing::info!(
        document_id = %request.document_id,
        sources = answer.sources.len(),
        "Chat request completed"
    );
    Ok(Json(ChatResponse {
        answer: answer.answer,
        sources: answer.sources,
    }))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_indexed: u64,
    chunks_indexed: u64,
    questions_answered: u64,
}

/// Return a concise metrics snapshot with document, chunk, and question counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: RagApi,
{
    let snapshot = service.metrics_snapshot();
    Json(MetricsResponse {
        documents_indexed: snapshot.documents_indexed,
        chunks_indexed: snapshot.chunks_indexed,
        questions_answered: snapshot.questions_answered,
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Upload a PDF (multipart field 'file'), chunk and embed its text, and store the chunks. Response returns { \"document_id\": string, \"pages\": number, \"chunks_stored\": number }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Answer a question against an uploaded document. Response returns { \"answer\": string, \"sources\": [string] }.",
                request_example: Some(json!({
                    "question": "What is the refund policy?",
                    "document_id": "8e7a0a3e-3f2b-4a39-a6cf-7f1a1c2f9b10"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and query counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Error wrapper translating pipeline failures into HTTP responses.
enum AppError {
    /// Client supplied an invalid request.
    BadRequest(String),
    /// Upload pipeline failure; status depends on the error class.
    Upload(UploadError),
    /// Question pipeline failure; always a server fault.
    Ask(AskError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Upload(error) if error.is_client_error() => {
                (StatusCode::BAD_REQUEST, error.to_string()).into_response()
            }
            Self::Upload(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
            Self::Ask(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(inner: UploadError) -> Self {
        Self::Upload(inner)
    }
}

impl From<AskError> for AppError {
    fn from(inner: AskError) -> Self {
        Self::Ask(inner)
    }
}
