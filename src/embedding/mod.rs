//! Embedding providers.
//!
//! The pipeline only talks to [`EmbeddingProvider`]; concrete backends are
//! chosen from [`EmbeddingConfig`] by [`from_config`].

pub mod error;
#[cfg(feature = "local-models")]
pub mod fastembed;
pub mod hashing;
pub mod openai;

pub use error::{EmbeddingError, EmbeddingResult};
pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logs and summaries.
    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a batch; output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding batch".to_string()))
    }
}

/// Build the configured provider.
pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::from_config(config)?)),
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        EmbeddingProviderKind::FastEmbed => fastembed_provider(config),
    }
}

#[cfg(feature = "local-models")]
fn fastembed_provider(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(fastembed::FastEmbedder::from_config(config)?))
}

#[cfg(not(feature = "local-models"))]
fn fastembed_provider(_config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    Err(EmbeddingError::Config(
        "provider 'fastembed' requires building with the 'local-models' feature".to_string(),
    ))
}

/// Check that every vector has the expected length.
pub(crate) fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> EmbeddingResult<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}
