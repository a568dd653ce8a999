//! Retrieval: turn a question into ranked, language-aware chunks.

pub mod api;
pub mod context;
pub mod engine;
pub mod error;
pub mod language;
pub mod query;

pub use api::{QueryRequest, QueryResponse, ResponseChunk, respond};
pub use context::{build_context, format_sources};
pub use engine::RetrievalEngine;
pub use error::RetrievalError;
pub use language::{DetectedLanguage, LanguagePolicy};
pub use query::{
    Anchor, FallbackNotice, RetrievalMode, RetrievalOutcome, RetrievalQuery, RetrievedChunk,
};
