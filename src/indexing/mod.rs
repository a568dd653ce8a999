//! Corpus indexing: load, chunk, embed, upsert.

pub mod error;
pub mod indexer;
pub mod summary;

pub use error::{IndexError, IndexResult};
pub use indexer::EmbeddingIndexer;
pub use summary::{BatchFailure, DocumentOutcome, FailureStage, IndexSummary};

use tokio_util::sync::CancellationToken;

use crate::documents::ContentLoader;

/// Options for a single indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Load and chunk only; no provider or store calls.
    pub dry_run: bool,
    /// Index at most this many files (sorted path order).
    pub limit: Option<usize>,
}

/// Run the whole pipeline over a corpus.
///
/// Loading happens on the blocking pool. The store is prepared before the
/// first batch and flushed after the last one.
pub async fn index_corpus(
    loader: ContentLoader,
    indexer: &EmbeddingIndexer,
    options: &IndexOptions,
    cancel: &CancellationToken,
) -> IndexResult<IndexSummary> {
    let limit = options.limit;
    let report = tokio::task::spawn_blocking(move || loader.load_all(limit))
        .await
        .map_err(|e| IndexError::Task(e.to_string()))??;

    let skipped = report.skipped.len();
    if options.dry_run {
        let mut summary = indexer.plan(&report.documents);
        summary.documents_skipped = skipped;
        return Ok(summary);
    }

    indexer.prepare().await?;
    let mut summary = indexer.index_documents(report.documents, cancel).await;
    summary.documents_skipped = skipped;

    indexer.store().persist().await?;
    summary.store_count = Some(indexer.store().count().await?);
    Ok(summary)
}
