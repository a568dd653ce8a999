//! Corpus loading and chunking.
//!
//! This module provides:
//! - Discovery of Markdown/MDX files under a corpus root
//! - Front matter and path-convention metadata (language, module, translation)
//! - Heading-aware chunking with a token budget

pub mod chunker;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod loader;
pub mod types;

pub use chunker::{Chunker, HeadingChunker, TokenCounter, WordBoundaryCounter};
pub use config::{ChunkingConfig, CorpusConfig};
pub use error::{LoadError, LoadResult};
pub use loader::{ContentLoader, LoadReport, SkippedFile};
pub use types::{
    Chunk, Document, HeadingSpan, TranslationInfo, TranslationSource, normalize_language,
};
