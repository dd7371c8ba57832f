//! Retrieval-augmented answering pipeline: chunking, prompting, and orchestration.

pub mod chunking;
pub mod prompt;
mod service;
pub mod types;

pub use service::{PipelineSettings, RagApi, RagService};
pub use types::{
    Answer, AskError, ChunkingError, LLM_FAILURE_ANSWER, NO_CONTEXT_ANSWER, UploadError,
    UploadOutcome,
};
