//! Deterministic feature-hashing embedder.
//!
//! Unigrams and bigrams of lower-cased Unicode words are hashed into a fixed
//! number of buckets with a sign bit, then L2-normalised. Texts sharing words
//! land close together, which is enough for offline runs and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use super::{EmbeddingProvider, EmbeddingResult};

const MODEL_NAME: &str = "feature-hash-v1";

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0_f32; self.dimension];

        for feature in features(text) {
            let hash = stable_hash(&feature);
            let index = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + ((hash >> 48) & 0xFF) as f32 / 255.0;
            vector[index] += sign * weight;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// SHA-256 prefix: stable across builds and platforms.
fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn features(text: &str) -> Vec<String> {
    let words: Vec<String> = text.unicode_words().map(str::to_lowercase).collect();

    let mut features = Vec::with_capacity(words.len() * 2);
    for (i, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(i + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed_text("ROS 2 uses nodes and topics");
        let b = embedder.embed_text("ROS 2 uses nodes and topics");
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let embedder = HashingEmbedder::new(256);
        let query = embedder.embed_text("how do ros nodes publish topics");
        let related = embedder.embed_text("ROS nodes publish messages on topics");
        let unrelated = embedder.embed_text("Gazebo renders rigid body physics");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed_text("   ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_minimum_dimension() {
        assert_eq!(HashingEmbedder::new(2).dimension(), 8);
    }
}
