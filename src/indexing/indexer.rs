//! Chunk, embed and upsert documents.
//!
//! Data flow per document:
//! - Chunker produces ordered chunks
//! - Chunks are cut into batches of `batch_size`
//! - Each batch: embed (retry + timeout), then upsert (retry + timeout)
//!
//! Documents run concurrently; a semaphore bounds in-flight batches and a
//! per-path async lock serializes work on the same document. A failed batch is
//! recorded and the run moves on.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::summary::{BatchFailure, DocumentOutcome, FailureStage, IndexSummary};
use crate::config::Settings;
use crate::documents::{Chunk, Chunker, Document, HeadingChunker};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::retry::RetryPolicy;
use crate::store::{ChunkPayload, EmbeddingRecord, StoreError, VectorStore};

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Clone)]
pub struct EmbeddingIndexer {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
    batch_size: usize,
    permits: Arc<Semaphore>,
    embed_timeout: Duration,
    store_timeout: Duration,
    doc_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl EmbeddingIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            chunker: Arc::new(HeadingChunker::new(Default::default())),
            embedder,
            store,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            embed_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
            doc_locks: Arc::new(DashMap::new()),
        }
    }

    /// Indexer wired from settings.
    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self::new(embedder, store)
            .with_chunker(Arc::new(HeadingChunker::new(settings.chunking.clone())))
            .with_retry(RetryPolicy::from_config(&settings.retry))
            .with_batch_size(settings.embedding.batch_size)
            .with_concurrency(settings.indexing.concurrency)
            .with_timeouts(settings.embedding.timeout(), settings.vector_store.timeout())
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn with_timeouts(mut self, embed: Duration, store: Duration) -> Self {
        self.embed_timeout = embed;
        self.store_timeout = store;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Create the collection sized for the embedder.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        let dimension = self.embedder.dimension();
        let timeout = self.store_timeout;
        self.retry
            .run("ensure collection", || async move {
                tokio::time::timeout(timeout, self.store.ensure_collection(dimension))
                    .await
                    .map_err(|_| StoreError::Timeout(timeout))?
            })
            .await
    }

    /// Chunk counts only; no provider or store calls.
    pub fn plan(&self, documents: &[Document]) -> IndexSummary {
        let mut summary = IndexSummary {
            dry_run: true,
            ..Default::default()
        };
        for doc in documents {
            let chunks = self.chunker.chunk(doc);
            summary.record(DocumentOutcome {
                chunks: chunks.len(),
                ..Default::default()
            });
        }
        summary
    }

    /// Index every document, returning the aggregate outcome.
    ///
    /// Cancellation stops new batches from starting; finished work is kept
    /// and reported.
    pub async fn index_documents(
        &self,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> IndexSummary {
        let started = Instant::now();
        let mut summary = IndexSummary::default();
        let mut tasks = JoinSet::new();

        for doc in documents {
            let indexer = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { indexer.index_document(&doc, &cancel).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::error!(target: "indexer", "document task panicked: {e}");
                }
            }
        }

        summary.elapsed = started.elapsed();
        crate::log_event!(
            "indexer",
            "run finished",
            "{} documents, {} chunks upserted, {} failed in {:.1?}",
            summary.documents_processed,
            summary.chunks_upserted,
            summary.chunks_failed,
            summary.elapsed
        );
        summary
    }

    /// Index one document under its per-path lock.
    ///
    /// When every batch lands, records left over from a longer earlier version
    /// of the document are pruned.
    pub async fn index_document(&self, doc: &Document, cancel: &CancellationToken) -> DocumentOutcome {
        let lock = self
            .doc_locks
            .entry(doc.path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = {
            let _guard = lock.lock().await;
            self.index_locked(doc, cancel).await
        };

        // Map entry plus our clone: nobody else is waiting on this path
        self.doc_locks
            .remove_if(&doc.path, |_, entry| Arc::strong_count(entry) == 2);
        outcome
    }

    async fn index_locked(&self, doc: &Document, cancel: &CancellationToken) -> DocumentOutcome {
        let chunks = self.chunker.chunk(doc);
        let mut outcome = DocumentOutcome {
            chunks: chunks.len(),
            ..Default::default()
        };

        for batch in chunks.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let Ok(_permit) = self.permits.acquire().await else {
                outcome.cancelled = true;
                break;
            };

            match self.index_batch(doc, batch).await {
                Ok(written) => outcome.upserted += written,
                Err(failure) => {
                    tracing::warn!(
                        target: "indexer",
                        "{} chunks {:?} failed during {:?}: {}",
                        failure.document_path,
                        failure.chunk_range,
                        failure.stage,
                        failure.reason
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        if !outcome.cancelled && outcome.failures.is_empty() {
            self.prune_stale(&doc.path, chunks.len()).await;
        }

        tracing::debug!(
            target: "indexer",
            "{}: {}/{} chunks upserted",
            doc.path,
            outcome.upserted,
            outcome.chunks
        );
        outcome
    }

    /// Drop records at `keep` and beyond. A failure leaves stale chunks
    /// behind but the fresh ones are already written, so it is only logged.
    async fn prune_stale(&self, path: &str, keep: usize) {
        let store_timeout = self.store_timeout;
        let result = self
            .retry
            .run("prune document", || async move {
                tokio::time::timeout(store_timeout, self.store.prune_document(path, keep))
                    .await
                    .map_err(|_| StoreError::Timeout(store_timeout))?
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(target: "indexer", "could not prune stale chunks of {path}: {e}");
        }
    }

    async fn index_batch(&self, doc: &Document, batch: &[Chunk]) -> Result<usize, BatchFailure> {
        let range = match (batch.first(), batch.last()) {
            (Some(first), Some(last)) => first.chunk_index..last.chunk_index + 1,
            _ => return Ok(0),
        };
        let failure = |stage, reason: String| BatchFailure {
            document_path: doc.path.clone(),
            chunk_range: range.clone(),
            stage,
            reason,
        };

        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embed_timeout = self.embed_timeout;
        let vectors = self
            .retry
            .run("embed batch", || {
                let texts = &texts;
                async move {
                    tokio::time::timeout(embed_timeout, self.embedder.embed_batch(texts))
                        .await
                        .map_err(|_| EmbeddingError::Timeout(embed_timeout))?
                }
            })
            .await
            .map_err(|e| failure(FailureStage::Embedding, e.to_string()))?;

        if vectors.len() != batch.len() {
            return Err(failure(
                FailureStage::Embedding,
                format!("{} vectors for {} chunks", vectors.len(), batch.len()),
            ));
        }

        let records: Vec<EmbeddingRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::new(vector, ChunkPayload::new(doc, chunk)))
            .collect();

        let store_timeout = self.store_timeout;
        self.retry
            .run("upsert batch", || {
                let records = records.clone();
                async move {
                    tokio::time::timeout(store_timeout, self.store.upsert(records))
                        .await
                        .map_err(|_| StoreError::Timeout(store_timeout))?
                }
            })
            .await
            .map_err(|e| failure(FailureStage::Upsert, e.to_string()))
    }
}
