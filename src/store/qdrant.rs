//! Qdrant over its REST API.
//!
//! Uses cosine distance and keyword payload indexes on the fields retrieval
//! filters by. Upserts wait for the write to be applied so a following search
//! sees it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

use super::{
    ChunkPayload, EmbeddingRecord, ScoredChunk, SearchFilter, StoreError, StoreResult,
    VectorStore,
};
use crate::config::VectorStoreConfig;

/// Payload fields indexed as keywords.
const KEYWORD_INDEXES: &[&str] = &[
    "language",
    "document_path",
    "module",
    "original_language",
    "translation_source",
];

pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct SearchPoint {
    id: Uuid,
    score: f32,
    payload: Option<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    pub fn from_config(config: &VectorStoreConfig) -> StoreResult<Self> {
        Self::new(
            &config.url,
            &config.collection,
            config.resolved_api_key().as_deref(),
            config.timeout(),
        )
    }

    pub fn new(
        url: &str,
        collection: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        if collection.trim().is_empty() {
            return Err(StoreError::Config("collection name is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| StoreError::Config(format!("invalid API key: {e}")))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/collections/{}{path}", self.base_url, self.collection);
        self.client.request(method, url)
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Connection(err.to_string())
        }
    }

    /// Send and decode `{"result": T}`, mapping failures to typed errors.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> StoreResult<T> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("{operation}: {e}")))?;
        Ok(parsed.result)
    }

    async fn collection_exists(&self) -> StoreResult<bool> {
        let response = self
            .request(Method::GET, "")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(StoreError::Status {
                operation: "get collection",
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Point body for an upsert.
fn point_json(record: &EmbeddingRecord) -> StoreResult<Value> {
    Ok(json!({
        "id": record.id,
        "vector": record.vector,
        "payload": serde_json::to_value(&record.payload)?,
    }))
}

/// Request body for a filtered search.
fn search_body(vector: &[f32], filter: &SearchFilter, limit: usize) -> Value {
    let mut body = json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
    });
    if let Some(f) = filter.to_qdrant() {
        body["filter"] = f;
    }
    body
}

/// Request body deleting a document's chunks from `keep` onwards.
fn prune_body(document_path: &str, keep: usize) -> Value {
    json!({
        "filter": {
            "must": [
                { "key": "document_path", "match": { "value": document_path } },
                { "key": "chunk_index", "range": { "gte": keep } }
            ]
        }
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()> {
        if self.collection_exists().await? {
            tracing::debug!(target: "store", "collection {} exists", self.collection);
            return Ok(());
        }

        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        let _: Value = self
            .send("create collection", self.request(Method::PUT, "").json(&body))
            .await?;

        for field in KEYWORD_INDEXES {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            let _: Value = self
                .send(
                    "create payload index",
                    self.request(Method::PUT, "/index?wait=true").json(&body),
                )
                .await?;
        }
        let body = json!({ "field_name": "chunk_index", "field_schema": "integer" });
        let _: Value = self
            .send(
                "create payload index",
                self.request(Method::PUT, "/index?wait=true").json(&body),
            )
            .await?;

        tracing::info!(
            target: "store",
            "created collection {} ({dimension}-d, cosine)",
            self.collection
        );
        Ok(())
    }

    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let points = records
            .iter()
            .map(point_json)
            .collect::<StoreResult<Vec<_>>>()?;
        let body = json!({ "points": points });
        let _: Value = self
            .send(
                "upsert",
                self.request(Method::PUT, "/points?wait=true").json(&body),
            )
            .await?;
        Ok(records.len())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        let body = search_body(vector, filter, limit);
        let points: Vec<SearchPoint> = self
            .send(
                "search",
                self.request(Method::POST, "/points/search").json(&body),
            )
            .await?;

        points
            .into_iter()
            .map(|p| {
                let payload = p.payload.ok_or_else(|| {
                    StoreError::InvalidResponse(format!("point {} has no payload", p.id))
                })?;
                Ok(ScoredChunk {
                    id: p.id,
                    score: p.score,
                    payload,
                })
            })
            .collect()
    }

    async fn prune_document(&self, document_path: &str, keep: usize) -> StoreResult<()> {
        let _: Value = self
            .send(
                "delete",
                self.request(Method::POST, "/points/delete?wait=true")
                    .json(&prune_body(document_path, keep)),
            )
            .await?;
        Ok(())
    }

    async fn count(&self) -> StoreResult<usize> {
        let result: CountResult = self
            .send(
                "count",
                self.request(Method::POST, "/points/count")
                    .json(&json!({ "exact": true })),
            )
            .await?;
        Ok(result.count)
    }
}
