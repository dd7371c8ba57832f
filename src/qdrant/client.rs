//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::{
    VectorIndex,
    filters::document_filter,
    payload::{build_payload, chunk_point_id, current_timestamp_rfc3339},
    types::{ChunkPoint, QdrantError, QueryResponse, QueryResponseResult, ScoredChunk},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations against a single collection.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: u64,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        let client = Client::builder().user_agent("ragchat/0.1").build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.qdrant_collection_name,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
            vector_size: config.embedding_dimension as u64,
        })
    }

    /// Create the collection only when it is missing from Qdrant.
    async fn create_collection_if_not_exists(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        tracing::debug!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Creating collection"
        );

        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection created");
        })
        .await
    }

    /// Ensure a keyword payload index exists for document-id filtering.
    async fn ensure_document_index(&self) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": "document_id",
            "field_schema": "keyword",
        });

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/index", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        // CONFLICT means the index already exists; anything else is a real failure.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = %self.collection, "Payload index ensured");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Failed to create payload index");
            Err(error)
        }
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantService {
    async fn ensure_ready(&self) -> Result<(), QdrantError> {
        self.create_collection_if_not_exists().await?;
        self.ensure_document_index().await?;
        tracing::debug!(collection = %self.collection, "Collection ready");
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        document_id: &str,
        chunks: Vec<ChunkPoint>,
    ) -> Result<usize, QdrantError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                json!({
                    "id": chunk_point_id(document_id, chunk.chunk_index),
                    "vector": chunk.vector,
                    "payload": build_payload(document_id, chunk.chunk_index, &chunk.text, &now),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                document_id,
                points = point_count,
                "Chunks indexed"
            );
        })
        .await?;

        Ok(point_count)
    }

    async fn search_chunks(
        &self,
        vector: Vec<f32>,
        document_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
            "filter": document_filter(document_id),
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .filter_map(|point| {
                let mut payload = point.payload?;
                let text = match payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => return None,
                };
                let chunk_id = match payload.remove("chunk_id") {
                    Some(Value::String(id)) => id,
                    _ => String::new(),
                };
                Some(ScoredChunk {
                    chunk_id,
                    score: point.score,
                    text,
                })
            })
            .collect();

        Ok(results)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
    use reqwest::Client;

    fn test_service(base_url: String) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("ragchat-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
            collection: "pdf_docs".into(),
            vector_size: 3,
        }
    }

    #[tokio::test]
    async fn search_chunks_emits_filtered_query() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/pdf_docs/points/query")
                    .json_body_partial(
                        json!({
                            "limit": 3,
                            "filter": {
                                "must": [
                                    { "key": "document_id", "match": { "value": "doc-1" } }
                                ]
                            }
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "11111111-1111-5111-8111-111111111111",
                                "score": 0.42,
                                "payload": {
                                    "chunk_id": "doc-1_0",
                                    "document_id": "doc-1",
                                    "chunk_index": 0,
                                    "text": "Example chunk"
                                }
                            }
                        ]
                    }
                }));
            })
            .await;

        let service = test_service(server.base_url());
        let results = service
            .search_chunks(vec![0.1, 0.2, 0.3], "doc-1", 3)
            .await
            .expect("search request");

        mock.assert();

        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.chunk_id, "doc-1_0");
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.text, "Example chunk");
    }

    #[tokio::test]
    async fn upsert_chunks_writes_deterministic_points() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/pdf_docs/points")
                    .query_param("wait", "true");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 0, "status": "completed" }
                }));
            })
            .await;

        let service = test_service(server.base_url());
        let stored = service
            .upsert_chunks(
                "doc-1",
                vec![
                    ChunkPoint {
                        chunk_index: 0,
                        text: "first".into(),
                        vector: vec![0.1, 0.2, 0.3],
                    },
                    ChunkPoint {
                        chunk_index: 1,
                        text: "second".into(),
                        vector: vec![0.4, 0.5, 0.6],
                    },
                ],
            )
            .await
            .expect("upsert request");

        mock.assert();
        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn existing_payload_index_is_tolerated() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/pdf_docs");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {}
                }));
            })
            .await;
        let index_mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/pdf_docs/index");
                then.status(409)
                    .json_body(json!({ "status": { "error": "index already exists" }, "time": 0.0 }));
            })
            .await;

        let service = test_service(server.base_url());
        service.ensure_ready().await.expect("conflict tolerated");
        index_mock.assert();
    }

    #[tokio::test]
    async fn payload_index_failure_propagates() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/pdf_docs");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/pdf_docs/index");
                then.status(500)
                    .json_body(json!({ "status": { "error": "storage failure" }, "time": 0.0 }));
            })
            .await;

        let service = test_service(server.base_url());
        let error = service.ensure_ready().await.expect_err("index failure surfaces");
        assert!(matches!(
            error,
            QdrantError::UnexpectedStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn upsert_skips_empty_batches_without_io() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());
        let stored = service
            .upsert_chunks("doc-1", Vec::new())
            .await
            .expect("no-op upsert");
        assert_eq!(stored, 0);
    }
}
