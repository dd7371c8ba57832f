//! Helpers for constructing Qdrant point identifiers and payloads.

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// External identifier of a chunk within the index.
pub(crate) fn chunk_external_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_{chunk_index}")
}

/// Deterministic Qdrant point id derived from the external chunk identifier.
///
/// Qdrant only accepts UUIDs or unsigned integers as point ids, so the external
/// `{document_id}_{chunk_index}` key is folded into a UUIDv5. Re-ingesting the same document id
/// therefore overwrites its chunks in place instead of accumulating duplicates.
pub(crate) fn chunk_point_id(document_id: &str, chunk_index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        chunk_external_id(document_id, chunk_index).as_bytes(),
    )
    .to_string()
}

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(
    document_id: &str,
    chunk_index: usize,
    text: &str,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "chunk_id".into(),
        Value::String(chunk_external_id(document_id, chunk_index)),
    );
    payload.insert(
        "document_id".into(),
        Value::String(document_id.to_string()),
    );
    payload.insert("chunk_index".into(), json!(chunk_index));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
