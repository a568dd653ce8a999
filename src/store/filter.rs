//! Payload filters shared by every store backend.

use serde_json::{Value, json};
use std::ops::Range;

use super::record::ChunkPayload;

/// Conjunction of payload conditions. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub language: Option<String>,
    pub document_path: Option<String>,
    /// Half-open chunk index range.
    pub chunk_index: Option<Range<usize>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn document(mut self, path: impl Into<String>) -> Self {
        self.document_path = Some(path.into());
        self
    }

    pub fn chunk_range(mut self, range: Range<usize>) -> Self {
        self.chunk_index = Some(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.document_path.is_none() && self.chunk_index.is_none()
    }

    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        self.language
            .as_ref()
            .is_none_or(|lang| &payload.language == lang)
            && self
                .document_path
                .as_ref()
                .is_none_or(|path| &payload.document_path == path)
            && self
                .chunk_index
                .as_ref()
                .is_none_or(|range| range.contains(&payload.chunk_index))
    }

    /// Qdrant filter JSON, or `None` for an empty filter.
    pub fn to_qdrant(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }

        let mut must = Vec::new();
        if let Some(lang) = &self.language {
            must.push(json!({ "key": "language", "match": { "value": lang } }));
        }
        if let Some(path) = &self.document_path {
            must.push(json!({ "key": "document_path", "match": { "value": path } }));
        }
        if let Some(range) = &self.chunk_index {
            must.push(json!({
                "key": "chunk_index",
                "range": { "gte": range.start, "lt": range.end }
            }));
        }
        Some(json!({ "must": must }))
    }
}
