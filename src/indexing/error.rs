//! Errors that stop an indexing run before any batch is attempted.
//!
//! Per-batch failures never surface here; they are recorded in the
//! [`IndexSummary`](super::IndexSummary) and the run continues.

use thiserror::Error;

use crate::documents::LoadError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to load corpus: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to prepare vector store: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid chunking configuration: {0}")]
    Config(String),

    #[error("Loader task failed: {0}")]
    Task(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
