//! Error types for embedding providers.

use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Rate limited by embedding provider (HTTP {status})")]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("Transient embedding provider failure: {0}")]
    Transient(String),

    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding provider rejected request (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider misconfigured: {0}")]
    Config(String),

    #[error("Local embedding model failed: {0}")]
    Model(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient(_) | Self::Timeout(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(
            EmbeddingError::RateLimited {
                status: 429,
                retry_after: None
            }
            .is_retryable()
        );
        assert!(EmbeddingError::Transient("503".into()).is_retryable());
        assert!(EmbeddingError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            !EmbeddingError::Provider {
                status: 400,
                body: "bad input".into()
            }
            .is_retryable()
        );
        assert!(!EmbeddingError::Config("missing key".into()).is_retryable());
    }
}
