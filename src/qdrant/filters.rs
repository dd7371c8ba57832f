//! Filter construction for scoping searches to a single document.

use serde_json::{Value, json};

/// Build the Qdrant filter restricting a query to one document's chunks.
pub(crate) fn document_filter(document_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "value": document_id }
            }
        ]
    })
}
