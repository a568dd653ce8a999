//! Vector storage.
//!
//! [`VectorStore`] is the seam between the pipeline and the backend:
//! - [`QdrantStore`] talks to Qdrant's REST API
//! - [`MemoryStore`] keeps records in-process with an optional JSON snapshot

pub mod error;
pub mod filter;
pub mod memory;
pub mod qdrant;
pub mod record;

pub use error::{StoreError, StoreResult};
pub use filter::SearchFilter;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use record::{ChunkPayload, ContentType, EmbeddingRecord, ScoredChunk, record_id};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{VectorStoreConfig, VectorStoreKind};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Create the collection and payload indexes if missing.
    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()>;

    /// Insert or overwrite records by id. Returns how many were written.
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> StoreResult<usize>;

    /// Top `limit` records matching `filter`, best score first.
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>>;

    /// Delete the records of `document_path` whose chunk index is `keep` or
    /// higher. Called after a document is re-indexed with fewer chunks.
    async fn prune_document(&self, document_path: &str, keep: usize) -> StoreResult<()>;

    /// Number of stored records.
    async fn count(&self) -> StoreResult<usize>;

    /// Flush state to durable storage, when the backend needs it.
    async fn persist(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Build the configured store.
pub fn from_config(config: &VectorStoreConfig) -> StoreResult<Arc<dyn VectorStore>> {
    match config.backend {
        VectorStoreKind::Qdrant => Ok(Arc::new(QdrantStore::from_config(config)?)),
        VectorStoreKind::Memory => Ok(Arc::new(MemoryStore::open(&config.snapshot_path)?)),
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
