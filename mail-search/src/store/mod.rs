//! Storage collaborators of the search pipeline
//!
//! - [`MessageStore`]: relational message metadata (keyword queries, vector joins)
//! - [`VectorStore`]: embedding vectors and similarity search, kept in
//!   SQLite ([`SqliteVectorStore`]) or in process memory ([`MemoryVectorStore`])
//!
//! Both are injected into the workflow as trait objects so tests can supply fakes.

pub mod memory;
pub mod sqlite;
pub mod sqlite_vector;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteMessageStore;
pub use sqlite_vector::SqliteVectorStore;

/// Stored message metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: i64,
    pub account_id: i64,
    /// Provider message id (Gmail id)
    pub external_message_id: String,
    pub thread_id: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
    pub subject: String,
    pub snippet: String,
    pub date_sent: DateTime<Utc>,
    pub labels: Vec<String>,
    pub is_important: bool,
    pub has_attachments: bool,
}

/// A similarity hit returned by the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub vector_id: String,
    /// Cosine similarity
    pub score: f32,
}

/// Message metadata store scoped by account
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages of `account_id` whose subject or snippet contains every keyword
    /// (case-insensitive), newest first, at most `cap`.
    ///
    /// With no keywords, returns the `cap` most recent messages.
    async fn query_by_keywords(
        &self,
        account_id: i64,
        keywords: &[String],
        cap: usize,
    ) -> Result<Vec<EmailMessage>>;

    /// Join a vector reference back to its message, if it belongs to `account_id`
    async fn resolve_vector(&self, account_id: i64, vector_id: &str) -> Result<Option<EmailMessage>>;
}

/// Vector storage and similarity search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `cap` hits with score >= `score_threshold`, best first
    async fn similarity_search(
        &self,
        vector: &[f32],
        cap: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>>;

    /// Insert or replace a vector
    async fn upsert(&self, vector_id: &str, vector: Vec<f32>) -> Result<()>;

    /// Number of stored vectors
    async fn count(&self) -> Result<usize>;
}
