//! Query and result types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::error::RetrievalError;
use crate::documents::Chunk;

/// How a query is scoped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalMode {
    /// Similarity search over the whole corpus.
    #[default]
    WholeBook,
    /// Anchor on a passage the reader selected, return its neighbourhood.
    Selection,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::WholeBook => "whole-book",
            RetrievalMode::Selection => "selection",
        }
    }
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whole-book" | "whole_book" | "wholebook" => Ok(RetrievalMode::WholeBook),
            "selection" => Ok(RetrievalMode::Selection),
            other => Err(format!("unknown retrieval mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalQuery {
    pub mode: RetrievalMode,
    pub query_text: String,
    /// Passage selected by the reader (selection mode).
    pub selection_text: Option<String>,
    /// Document the selection came from (selection mode).
    pub anchor_document_path: Option<String>,
    pub requested_language: Option<String>,
}

impl RetrievalQuery {
    pub fn whole_book(query_text: impl Into<String>) -> Self {
        Self {
            mode: RetrievalMode::WholeBook,
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    pub fn selection(
        query_text: impl Into<String>,
        selection_text: impl Into<String>,
        anchor_document_path: impl Into<String>,
    ) -> Self {
        Self {
            mode: RetrievalMode::Selection,
            query_text: query_text.into(),
            selection_text: Some(selection_text.into()),
            anchor_document_path: Some(anchor_document_path.into()),
            requested_language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.requested_language = Some(language.into());
        self
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query_text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query text is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Why a query was answered differently from how it was asked.
///
/// Notices are informational. They never turn into errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackNotice {
    /// Selection could not be anchored; answered as whole-book.
    AnchorNotFound {
        document_path: Option<String>,
        reason: String,
    },
    /// Requested language is not carried by the corpus.
    LanguageUnsupported { requested: String, used: String },
    /// Too few requested-language chunks; filled from the default language.
    LanguageFilled {
        requested: String,
        used: String,
        requested_hits: usize,
    },
}

/// Chunk chosen as the centre of a selection window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anchor {
    pub document_path: String,
    pub chunk_index: usize,
    pub score: f32,
    /// Found by text containment rather than score alone.
    pub exact_match: bool,
    pub window: Range<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalOutcome {
    pub mode: RetrievalMode,
    pub chunks: Vec<RetrievedChunk>,
    pub fallback_applied: bool,
    pub selection_fallback_applied: bool,
    pub notices: Vec<FallbackNotice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("whole-book".parse::<RetrievalMode>(), Ok(RetrievalMode::WholeBook));
        assert_eq!("Selection".parse::<RetrievalMode>(), Ok(RetrievalMode::Selection));
        assert!("chapter".parse::<RetrievalMode>().is_err());
        assert_eq!(
            serde_json::to_value(RetrievalMode::WholeBook).unwrap(),
            "whole-book"
        );
    }

    #[test]
    fn test_empty_query_is_invalid() {
        assert!(RetrievalQuery::whole_book("  ").validate().is_err());
        assert!(RetrievalQuery::whole_book("what is a node?").validate().is_ok());
    }
}
