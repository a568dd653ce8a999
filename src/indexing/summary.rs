//! Aggregated outcome of an indexing run.

use serde::Serialize;
use std::ops::Range;
use std::time::Duration;

/// Which step a batch failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Embedding,
    Upsert,
}

/// A batch whose chunks did not reach the store.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub document_path: String,
    /// Half-open chunk index range of the batch.
    pub chunk_range: Range<usize>,
    pub stage: FailureStage,
    pub reason: String,
}

impl BatchFailure {
    pub fn chunk_count(&self) -> usize {
        self.chunk_range.len()
    }
}

/// Result of indexing one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentOutcome {
    pub chunks: usize,
    pub upserted: usize,
    pub failures: Vec<BatchFailure>,
    /// Stopped early by cancellation.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    pub documents_processed: usize,
    /// Files the loader could not parse.
    pub documents_skipped: usize,
    /// Documents with at least one failed batch.
    pub documents_failed: usize,
    pub chunks_processed: usize,
    pub chunks_upserted: usize,
    pub chunks_failed: usize,
    pub failures: Vec<BatchFailure>,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Records in the store after the run (None for dry runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_count: Option<usize>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl IndexSummary {
    pub fn record(&mut self, outcome: DocumentOutcome) {
        self.documents_processed += 1;
        self.chunks_processed += outcome.chunks;
        self.chunks_upserted += outcome.upserted;
        if !outcome.failures.is_empty() {
            self.documents_failed += 1;
        }
        self.chunks_failed += outcome
            .failures
            .iter()
            .map(BatchFailure::chunk_count)
            .sum::<usize>();
        self.failures.extend(outcome.failures);
        self.cancelled |= outcome.cancelled;
    }

    /// Every attempted chunk failed.
    pub fn all_failed(&self) -> bool {
        !self.dry_run && self.chunks_failed > 0 && self.chunks_upserted == 0
    }

    pub fn has_failures(&self) -> bool {
        self.chunks_failed > 0
    }
}
