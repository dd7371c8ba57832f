#![deny(missing_docs)]

//! Core library for the ragchat question answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and query metrics helpers.
pub mod metrics;
/// PDF text extraction helpers.
pub mod pdf;
/// Retrieval-augmented answering pipeline.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
