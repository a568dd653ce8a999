//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod config;
pub mod index;
pub mod init;
pub mod query;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::embedding::{self, EmbeddingProvider};
use crate::store::{self, VectorStore};

/// Resolve a configured path against the workspace root.
pub(crate) fn resolve_path(settings: &Settings, path: &Path) -> PathBuf {
    match &settings.workspace_root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// Provider and store handles for the configured backends.
pub(crate) fn backends(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, Arc<dyn VectorStore>)> {
    let embedder = embedding::from_config(&settings.embedding)
        .context("Failed to initialise embedding provider")?;

    let mut store_config = settings.vector_store.clone();
    store_config.snapshot_path = resolve_path(settings, &store_config.snapshot_path);
    let store =
        store::from_config(&store_config).context("Failed to initialise vector store")?;

    tracing::debug!(
        target: "cli",
        "embedding provider {} ({} dims), store {}",
        embedder.model_name(),
        embedder.dimension(),
        store.name()
    );
    Ok((embedder, store))
}
