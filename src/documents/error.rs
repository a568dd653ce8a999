//! Error types for corpus loading.

use std::path::PathBuf;
use thiserror::Error;

use super::frontmatter::FrontMatterError;

/// Errors raised while discovering or parsing corpus files.
///
/// Per-file variants are recoverable: the loader logs them and moves on.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Corpus root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("Cannot parse front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("Directory traversal failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl LoadError {
    /// Whether the error concerns a single file and the traversal can continue.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Encoding { .. } | Self::FrontMatter { .. }
        )
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
