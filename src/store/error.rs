use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot reach vector store: {0}")]
    Connection(String),

    #[error("Vector store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Vector store returned HTTP {status} during {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid vector store response: {0}")]
    InvalidResponse(String),

    #[error("Vector dimension mismatch: collection uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot error at {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Vector store misconfigured: {0}")]
    Config(String),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
