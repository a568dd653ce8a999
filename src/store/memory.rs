//! In-process vector store.
//!
//! Brute-force cosine search over an insertion-ordered map. With a snapshot
//! path the store loads on open and writes on [`VectorStore::persist`]; the
//! write goes through a temp file in the same directory and is renamed into
//! place.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{
    EmbeddingRecord, ScoredChunk, SearchFilter, StoreError, StoreResult, VectorStore,
    cosine_similarity,
};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct Inner {
    dimension: Option<usize>,
    records: IndexMap<Uuid, EmbeddingRecord>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: Option<usize>,
    records: Vec<EmbeddingRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Volatile store with no snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a snapshot file, loading it when present.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();

        if path.exists() {
            let bytes = std::fs::read(&path).map_err(|source| StoreError::Snapshot {
                path: path.clone(),
                source,
            })?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StoreError::InvalidResponse(format!(
                    "snapshot version {} is not supported",
                    snapshot.version
                )));
            }
            inner.dimension = snapshot.dimension;
            inner.records = snapshot.records.into_iter().map(|r| (r.id, r)).collect();
            tracing::debug!(
                target: "store",
                "loaded {} records from {}",
                inner.records.len(),
                path.display()
            );
        }

        Ok(Self {
            inner: RwLock::new(inner),
            snapshot_path: Some(path),
        })
    }

    /// All record ids in insertion order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.read().records.keys().copied().collect()
    }

    pub fn get(&self, id: &Uuid) -> Option<EmbeddingRecord> {
        self.inner.read().records.get(id).cloned()
    }

    fn write_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = {
            let inner = self.inner.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                dimension: inner.dimension,
                records: inner.records.values().cloned().collect(),
            }
        };
        let json = serde_json::to_vec(&snapshot)?;

        let snapshot_err = |source| StoreError::Snapshot {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(snapshot_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(snapshot_err)?;
        tmp.write_all(&json).map_err(snapshot_err)?;
        tmp.persist(path).map_err(|e| snapshot_err(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()> {
        let mut inner = self.inner.write();
        match inner.dimension {
            Some(existing) if existing != dimension => Err(StoreError::DimensionMismatch {
                expected: existing,
                actual: dimension,
            }),
            _ => {
                inner.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let count = records.len();

        // Check the whole batch before writing any of it
        let dimension = inner
            .dimension
            .or_else(|| records.first().map(|r| r.vector.len()));
        if let Some(dimension) = dimension {
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: bad.vector.len(),
                });
            }
            inner.dimension = Some(dimension);
        }

        for record in records {
            inner.records.insert(record.id, record);
        }

        Ok(count)
    }

    async fn prune_document(&self, document_path: &str, keep: usize) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        inner.records.retain(|_, r| {
            r.payload.document_path != document_path || r.payload.chunk_index < keep
        });

        let removed = before - inner.records.len();
        if removed > 0 {
            tracing::debug!(target: "store", "pruned {removed} stale records of {document_path}");
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        let inner = self.inner.read();
        if let Some(dimension) = inner.dimension {
            if vector.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        let mut hits: Vec<ScoredChunk> = inner
            .records
            .values()
            .filter(|r| filter.matches(&r.payload))
            .map(|r| ScoredChunk {
                id: r.id,
                score: cosine_similarity(vector, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.payload.document_path.cmp(&b.payload.document_path))
                .then_with(|| a.payload.chunk_index.cmp(&b.payload.chunk_index))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.inner.read().records.len())
    }

    async fn persist(&self) -> StoreResult<()> {
        match &self.snapshot_path {
            Some(path) => {
                self.write_snapshot(path)?;
                tracing::debug!(target: "store", "snapshot written to {}", path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }
}
