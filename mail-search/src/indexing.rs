//! Embedding sync
//!
//! Embeds stored messages that have no vector yet and records where each
//! vector lives, so the semantic stage can join hits back to messages.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{clean_text, EmbeddingProvider};
use crate::error::{Result, SearchError};
use crate::store::sqlite::EmbeddingRecord;
use crate::store::{EmailMessage, SqliteMessageStore, VectorStore};

/// Field name recorded for subject + snippet embeddings
pub const SUBJECT_SNIPPET_FIELD: &str = "subject_snippet";

/// Outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Vector index summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub vector_dimensions: usize,
    pub distance_metric: String,
    pub embedding_model: String,
}

pub struct EmbeddingSync {
    messages: SqliteMessageStore,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingSync {
    pub fn new(
        messages: SqliteMessageStore,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            messages,
            vectors,
            embedder,
        }
    }

    /// Embed up to `limit` of the account's newest messages lacking a vector.
    ///
    /// Only listing the pending messages can fail; per-message failures are
    /// counted in the report.
    pub async fn sync_account(&self, account_id: i64, limit: usize) -> Result<SyncReport> {
        let pending = self.messages.messages_without_embeddings(account_id, limit).await?;

        let mut report = SyncReport {
            total: pending.len(),
            ..Default::default()
        };

        for message in &pending {
            match self.sync_message(message).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    let error = format!("Message {}: {}", message.external_message_id, e);
                    warn!("Embedding sync failed for {}", error);
                    report.failed += 1;
                    report.errors.push(error);
                }
            }
        }

        info!(
            "📚 Embedding sync for account {}: {}/{} synced, {} failed",
            account_id, report.synced, report.total, report.failed
        );
        Ok(report)
    }

    /// Size and shape of the vector index
    pub async fn stats(&self) -> Result<IndexStats> {
        let stats = IndexStats {
            total_vectors: self.vectors.count().await?,
            vector_dimensions: self.embedder.dimensions(),
            distance_metric: "cosine".to_string(),
            embedding_model: self.embedder.model_name().to_string(),
        };
        debug!("Index stats: {} vectors, {}D", stats.total_vectors, stats.vector_dimensions);
        Ok(stats)
    }

    async fn sync_message(&self, message: &EmailMessage) -> Result<()> {
        let text = clean_text(&format!("{} {}", message.subject, message.snippet));
        if text.is_empty() {
            return Err(SearchError::Embedding("message has no subject or snippet".to_string()));
        }

        let vector = self.embedder.embed(&text).await?;
        let dimensions = vector.len();
        let vector_id = Uuid::new_v4().to_string();

        self.vectors.upsert(&vector_id, vector).await?;
        self.messages
            .record_embedding(&EmbeddingRecord {
                message_id: message.id,
                vector_id,
                field_name: SUBJECT_SNIPPET_FIELD.to_string(),
                embedding_model: self.embedder.model_name().to_string(),
                vector_dimensions: dimensions,
            })
            .await
    }
}
