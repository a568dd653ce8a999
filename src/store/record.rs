//! Stored record shapes: the typed payload kept next to every vector.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{Chunk, Document, TranslationSource};

/// Fixed namespace for record identifiers. Changing it re-keys every record.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x5f0c_9a7e_2b41_4d3a_9c55_1e8b_7a60_d2f4);

/// Deterministic record id for a chunk position.
///
/// UUIDv5 over `"{document_path}:{chunk_index}"`, so re-indexing the same
/// position overwrites instead of duplicating.
pub fn record_id(document_path: &str, chunk_index: usize) -> Uuid {
    Uuid::new_v5(
        &RECORD_NAMESPACE,
        format!("{document_path}:{chunk_index}").as_bytes(),
    )
}

/// Category of stored content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Docs,
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_path: String,
    pub chunk_index: usize,
    pub heading_path: String,
    pub text: String,
    pub token_count: usize,

    // Language filters
    pub language: String,
    pub original_language: String,
    pub translation_source: TranslationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_quality: Option<f32>,

    #[serde(default)]
    pub content_type: ContentType,
    pub module: String,
    pub title: String,
    pub url_path: String,

    /// Hash of the source file when this chunk was produced
    pub content_hash: String,
}

impl ChunkPayload {
    pub fn new(doc: &Document, chunk: &Chunk) -> Self {
        Self {
            document_path: chunk.document_path.clone(),
            chunk_index: chunk.chunk_index,
            heading_path: chunk.heading_path.clone(),
            text: chunk.text.clone(),
            token_count: chunk.token_count,
            language: chunk.language.clone(),
            original_language: doc.translation.original_language.clone(),
            translation_source: doc.translation.source,
            translation_quality: doc.translation.quality,
            content_type: ContentType::Docs,
            module: chunk.module.clone(),
            title: chunk.title.clone(),
            url_path: chunk.url_path.clone(),
            content_hash: doc.content_hash.clone(),
        }
    }

    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            document_path: self.document_path.clone(),
            chunk_index: self.chunk_index,
            heading_path: self.heading_path.clone(),
            text: self.text.clone(),
            token_count: self.token_count,
            language: self.language.clone(),
            module: self.module.clone(),
            title: self.title.clone(),
            url_path: self.url_path.clone(),
        }
    }
}

/// One vector per chunk, keyed by [`record_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl EmbeddingRecord {
    pub fn new(vector: Vec<f32>, payload: ChunkPayload) -> Self {
        Self {
            id: record_id(&payload.document_path, payload.chunk_index),
            vector,
            payload,
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}
