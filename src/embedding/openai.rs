//! OpenAI-compatible embeddings client.
//!
//! A single attempt per call; retries belong to the caller's `RetryPolicy`.
//! Status codes are classified so the policy can tell throttling and server
//! hiccups apart from requests that will never succeed.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult, check_dimensions};
use crate::config::EmbeddingConfig;

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            EmbeddingError::Config(
                "missing API key: set embedding.api_key or OPENAI_API_KEY".to_string(),
            )
        })?;
        Self::new(
            &api_key,
            &config.base_url,
            &config.model,
            config.dimension,
            config.timeout(),
        )
    }

    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> EmbeddingResult<Self> {
        if model.trim().is_empty() {
            return Err(EmbeddingError::Config("missing model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| EmbeddingError::Config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
            timeout,
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            EmbeddingError::Transient(err.to_string())
        } else {
            EmbeddingError::InvalidResponse(err.to_string())
        }
    }
}

/// Map a non-success status to an error.
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> EmbeddingError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        EmbeddingError::RateLimited {
            status: status.as_u16(),
            retry_after,
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        EmbeddingError::Transient(format!("HTTP {status}: {body}"))
    } else {
        EmbeddingError::Provider {
            status: status.as_u16(),
            body,
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, retry_after, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let vectors = parsed.into_vectors(texts.len())?;
        check_dimensions(&vectors, self.dimension)?;

        tracing::debug!(target: "embedding", "embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingResponse {
    /// Vectors in input order, checking that every input got one.
    fn into_vectors(mut self, expected: usize) -> EmbeddingResult<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "provider returned {} embeddings for {expected} inputs",
                self.data.len()
            )));
        }
        self.data.sort_by_key(|entry| entry.index);
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}
