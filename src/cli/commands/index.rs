//! Index command - load, chunk, embed and upsert the corpus.

use anyhow::Context;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{backends, resolve_path};
use crate::config::Settings;
use crate::documents::ContentLoader;
use crate::embedding::{EmbeddingProvider, HashingEmbedder};
use crate::indexing::{EmbeddingIndexer, IndexOptions, IndexSummary, index_corpus};
use crate::store::{MemoryStore, VectorStore};

/// Arguments for the index command.
pub struct IndexArgs {
    pub root: Option<PathBuf>,
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub json: bool,
}

/// Run the index command.
///
/// Exits non-zero when the backends cannot be initialised or every attempted
/// chunk failed.
pub async fn run(args: IndexArgs, settings: &Settings) -> anyhow::Result<ExitCode> {
    settings.validate().map_err(anyhow::Error::msg)?;

    let root = args
        .root
        .unwrap_or_else(|| resolve_path(settings, &settings.corpus.root));
    let loader = ContentLoader::with_root(&root, &settings.corpus)
        .with_context(|| format!("Cannot read corpus at {}", root.display()))?;

    // Dry runs never touch the configured provider or store.
    let (embedder, store): (Arc<dyn EmbeddingProvider>, Arc<dyn VectorStore>) = if args.dry_run {
        (
            Arc::new(HashingEmbedder::new(settings.embedding.dimension)),
            Arc::new(MemoryStore::new()),
        )
    } else {
        backends(settings)?
    };
    let indexer = EmbeddingIndexer::from_settings(settings, embedder, store);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "cli", "interrupt received, finishing in-flight batches");
            on_signal.cancel();
        }
    });

    let options = IndexOptions {
        dry_run: args.dry_run,
        limit: args.limit,
    };
    let summary = index_corpus(loader, &indexer, &options, &cancel)
        .await
        .context("Indexing failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &root);
    }

    if summary.all_failed() {
        eprintln!(
            "{} every attempted chunk failed",
            style("Error:").red().bold()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &IndexSummary, root: &std::path::Path) {
    let title = if summary.dry_run {
        "Dry run (no embeddings written)"
    } else {
        "Indexing complete"
    };
    println!("{} {}", style(title).cyan().bold(), style(root.display()).dim());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"]);

    table.add_row(vec![
        "Documents processed".to_string(),
        summary.documents_processed.to_string(),
    ]);
    table.add_row(vec![
        "Documents skipped".to_string(),
        summary.documents_skipped.to_string(),
    ]);
    table.add_row(vec![
        "Documents with failures".to_string(),
        summary.documents_failed.to_string(),
    ]);
    table.add_row(vec![
        "Chunks".to_string(),
        summary.chunks_processed.to_string(),
    ]);
    if !summary.dry_run {
        table.add_row(vec![
            "Chunks upserted".to_string(),
            summary.chunks_upserted.to_string(),
        ]);
        table.add_row(vec![
            "Chunks failed".to_string(),
            summary.chunks_failed.to_string(),
        ]);
    }
    if let Some(count) = summary.store_count {
        table.add_row(vec!["Records in store".to_string(), count.to_string()]);
    }
    table.add_row(vec![
        "Elapsed".to_string(),
        format!("{:.2}s", summary.elapsed.as_secs_f64()),
    ]);
    println!("{table}");

    if summary.cancelled {
        println!("{}", style("Run was cancelled before completion").yellow());
    }

    for failure in &summary.failures {
        eprintln!(
            "  {} {} chunks {}..{} ({:?}): {}",
            style("✗").red(),
            failure.document_path,
            failure.chunk_range.start,
            failure.chunk_range.end,
            failure.stage,
            failure.reason
        );
    }
}
