//! In-memory vector store
//!
//! Brute-force cosine similarity over every stored vector. Suitable for
//! development and tests; contents are lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{VectorHit, VectorStore};
use crate::error::{Result, SearchError};

/// Vector store kept in process memory
#[derive(Clone)]
pub struct MemoryVectorStore {
    dimensions: usize,
    vectors: Arc<RwLock<HashMap<String, Vec<f32>>>>,
}

impl MemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(SearchError::VectorStore(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        cap: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>> {
        self.check_dimensions(vector)?;

        let vectors = self.vectors.read().await;
        let mut hits: Vec<VectorHit> = vectors
            .iter()
            .map(|(id, stored)| VectorHit {
                vector_id: id.clone(),
                score: cosine_similarity(vector, stored),
            })
            .filter(|hit| hit.score >= score_threshold)
            .collect();

        // ties broken by id so equal scores come back in a stable order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_id.cmp(&b.vector_id))
        });
        hits.truncate(cap);

        debug!("Vector search over {} vectors returned {} hits", vectors.len(), hits.len());
        Ok(hits)
    }

    async fn upsert(&self, vector_id: &str, vector: Vec<f32>) -> Result<()> {
        self.check_dimensions(&vector)?;
        self.vectors.write().await.insert(vector_id.to_string(), vector);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().await.len())
    }
}
