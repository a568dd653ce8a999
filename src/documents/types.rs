//! Core types for loaded documents and their chunks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A heading found in a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingSpan {
    /// Level (1-6 for H1-H6).
    pub level: u8,

    /// Text of the heading with markers stripped.
    pub text: String,

    /// Byte offset where the heading line starts.
    pub start: usize,

    /// Byte offset just past the heading line (section body starts here).
    pub end: usize,
}

/// How a document came to exist in its language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationSource {
    /// Authored in this language.
    #[default]
    Original,
    /// Translated by a person.
    Human,
    /// Translated by a model.
    Machine,
}

impl TranslationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Human => "human",
            Self::Machine => "machine",
        }
    }
}

impl fmt::Display for TranslationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary language subtag, lowercased: `"ur-PK"` and `"UR"` both become `"ur"`.
pub fn normalize_language(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Translation metadata carried from front matter into every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationInfo {
    pub original_language: String,
    pub source: TranslationSource,
    /// Quality score in `[0, 1]`, when the translation was rated.
    pub quality: Option<f32>,
}

impl TranslationInfo {
    /// Metadata for a document authored in `language`.
    pub fn original(language: &str) -> Self {
        Self {
            original_language: language.to_string(),
            source: TranslationSource::Original,
            quality: None,
        }
    }
}

/// A loaded corpus document. Immutable once produced by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Corpus-relative path with `/` separators. Unique key.
    pub path: String,

    /// Front matter title, or the file stem.
    pub title: String,

    /// Routing path: i18n prefix and extension removed.
    pub url_path: String,

    pub language: String,

    pub module: String,

    /// Headings in document order.
    pub heading_tree: Vec<HeadingSpan>,

    /// Body text with front matter removed.
    pub raw_text: String,

    pub translation: TranslationInfo,

    /// SHA-256 of the file bytes, hex encoded.
    pub content_hash: String,
}

/// A retrieval unit cut from a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_path: String,

    /// 0-based position within the document; consecutive across the document.
    pub chunk_index: usize,

    /// Breadcrumb such as "Chapter 1 > Section 1.1".
    pub heading_path: String,

    pub text: String,

    pub token_count: usize,

    pub language: String,

    pub module: String,

    pub title: String,

    pub url_path: String,
}

impl Chunk {
    /// Get a preview of the text (first N characters).
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}
