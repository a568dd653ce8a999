//! Local ONNX embeddings via fastembed.
//!
//! The model runs on the blocking pool; one model instance is shared behind a
//! mutex since inference needs exclusive access.

use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::sync::Arc;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult, check_dimensions};
use crate::config::EmbeddingConfig;

pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
    dimension: usize,
}

/// Map a configured model name to a fastembed model.
fn model_from_name(name: &str) -> EmbeddingResult<EmbeddingModel> {
    match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
        "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "multilinguale5small" => Ok(EmbeddingModel::MultilingualE5Small),
        "paraphrasemlminilml12v2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        _ => Err(EmbeddingError::Config(format!(
            "unknown local model '{name}' (try MultilingualE5Small or AllMiniLML6V2)"
        ))),
    }
}

impl FastEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        let model = model_from_name(&config.model)?;
        let mut text_model =
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;

        // Measure the output size instead of trusting the configured dimension
        let sample = text_model
            .embed(vec!["dimension check"], None)
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;
        let dimension = sample
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::Model("model returned no vector for the dimension check".to_string()))?;

        if dimension != config.dimension {
            tracing::warn!(
                target: "embedding",
                "{} produces {dimension}-d vectors; configured dimension {} is ignored",
                config.model,
                config.dimension
            );
        }

        Ok(Self {
            model: Arc::new(Mutex::new(text_model)),
            name: config.model.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let inputs = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || model.lock().embed(inputs, None))
            .await
            .map_err(|e| EmbeddingError::Model(format!("embedding task failed: {e}")))?
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;

        check_dimensions(&vectors, self.dimension)?;
        Ok(vectors)
    }
}
