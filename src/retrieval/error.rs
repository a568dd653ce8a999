use std::time::Duration;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::store::StoreError;

/// Failures that end a retrieval. A query either returns results or one of
/// these, never an empty success caused by an outage.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Vector store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("Retrieval cancelled")]
    Cancelled,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}
