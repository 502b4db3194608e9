//! Mock embedder for development and testing
//!
//! Hashes each lower-cased word into a bucket of a fixed-size vector and
//! normalizes the result, so texts sharing words have high cosine similarity.

use async_trait::async_trait;
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{Result, SearchError};

/// Bag-of-words hashing embedder
pub struct MockEmbedder {
    model_name: String,
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            model_name: "mock-embedder-v1".to_string(),
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a, stable across runs and platforms
    fn bucket(&self, word: &str) -> usize {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let mut words = 0;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
            words += 1;
        }

        if words == 0 {
            return Err(SearchError::Embedding("cannot embed empty text".to_string()));
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }

        debug!("MockEmbedder: embedded {} words", words);
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
