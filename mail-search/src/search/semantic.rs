//! Vector similarity search joined back to message metadata

use std::sync::Arc;
use tracing::debug;

use super::types::{Provenance, SearchResult};
use crate::error::Result;
use crate::store::{MessageStore, VectorStore};

/// Vectors of every account share one store, so more hits than `cap` are
/// requested to leave room for the ones dropped by the account join.
const ACCOUNT_OVERFETCH: usize = 4;

/// Semantic retrieval stage
pub struct VectorSearch {
    vectors: Arc<dyn VectorStore>,
    messages: Arc<dyn MessageStore>,
}

impl VectorSearch {
    pub fn new(vectors: Arc<dyn VectorStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self { vectors, messages }
    }

    /// Up to `cap` of the account's messages nearest to `query_vector`,
    /// scoring at least `score_threshold`.
    ///
    /// Hits that do not resolve to a message of `account_id` are dropped.
    pub async fn search(
        &self,
        account_id: i64,
        query_vector: &[f32],
        cap: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        let hits = self
            .vectors
            .similarity_search(query_vector, cap.saturating_mul(ACCOUNT_OVERFETCH), score_threshold)
            .await?;

        let mut results = Vec::with_capacity(cap.min(hits.len()));
        for hit in hits {
            if results.len() == cap {
                break;
            }
            match self.messages.resolve_vector(account_id, &hit.vector_id).await? {
                Some(message) => results.push(SearchResult::from_message(
                    message,
                    f64::from(hit.score),
                    Provenance::Semantic,
                )),
                None => debug!(
                    "Vector {} has no message in account {}, skipping",
                    hit.vector_id, account_id
                ),
            }
        }

        debug!("Semantic search returned {} results", results.len());
        Ok(results)
    }
}
