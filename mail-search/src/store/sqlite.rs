//! SQLite message store
//!
//! Holds message metadata (`email_messages`) and the mapping from vector ids to
//! messages (`message_embeddings`).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use super::{EmailMessage, MessageStore};
use crate::error::{Result, SearchError};

const MESSAGE_COLUMNS: &str = "m.id, m.account_id, m.external_message_id, m.thread_id, \
     m.sender_email, m.sender_name, m.subject, m.snippet, m.date_sent, m.labels, \
     m.is_important, m.has_attachments";

/// Message to insert or update, keyed by `(account_id, external_message_id)`
#[derive(Debug, Clone)]
pub struct NewEmailMessage {
    pub account_id: i64,
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

/// Embedding bookkeeping row
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub message_id: i64,
    pub vector_id: String,
    pub field_name: String,
    pub embedding_model: String,
    pub vector_dimensions: usize,
}

/// Message store backed by SQLite
#[derive(Clone)]
pub struct SqliteMessageStore {
    db: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `database_url` and initialize the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // an in-memory database only exists on its own connection
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init_db().await?;
        info!("Message store ready at {}", database_url);
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Create tables and indexes
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                external_message_id TEXT NOT NULL,
                thread_id TEXT,
                sender_email TEXT NOT NULL,
                sender_name TEXT,
                subject TEXT,
                snippet TEXT,
                date_sent TEXT NOT NULL,
                labels TEXT,
                is_important BOOLEAN NOT NULL DEFAULT 0,
                has_attachments BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(account_id, external_message_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_embeddings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL REFERENCES email_messages(id),
                field_name TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                vector_id TEXT NOT NULL UNIQUE,
                vector_dimensions INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_account_date ON email_messages(account_id, date_sent)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_message ON message_embeddings(message_id)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Insert a message, or update it if the provider id is already stored. Returns the row id.
    pub async fn upsert_message(&self, message: &NewEmailMessage) -> Result<i64> {
        let labels_json = serde_json::to_string(&message.labels)?;

        sqlx::query(
            r#"
            INSERT INTO email_messages (
                account_id, external_message_id, thread_id, sender_email, sender_name,
                subject, snippet, date_sent, labels, is_important, has_attachments, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, external_message_id) DO UPDATE SET
                thread_id = excluded.thread_id,
                sender_email = excluded.sender_email,
                sender_name = excluded.sender_name,
                subject = excluded.subject,
                snippet = excluded.snippet,
                date_sent = excluded.date_sent,
                labels = excluded.labels,
                is_important = excluded.is_important,
                has_attachments = excluded.has_attachments
            "#,
        )
        .bind(message.account_id)
        .bind(&message.external_message_id)
        .bind(&message.thread_id)
        .bind(&message.sender_email)
        .bind(&message.sender_name)
        .bind(&message.subject)
        .bind(&message.snippet)
        .bind(format_timestamp(message.date_sent))
        .bind(&labels_json)
        .bind(message.is_important)
        .bind(message.has_attachments)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM email_messages WHERE account_id = ? AND external_message_id = ?",
        )
        .bind(message.account_id)
        .bind(&message.external_message_id)
        .fetch_one(&self.db)
        .await?;

        debug!("Stored message {} as id {}", message.external_message_id, id);
        Ok(id)
    }

    /// Get a message by row id
    pub async fn get_message(&self, id: i64) -> Result<Option<EmailMessage>> {
        let sql = format!("SELECT {} FROM email_messages m WHERE m.id = ?", MESSAGE_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        row.map(|row| row_to_message(&row)).transpose()
    }

    /// Number of messages stored for an account
    pub async fn count_messages(&self, account_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM email_messages WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Newest messages of an account that have no embedding yet
    pub async fn messages_without_embeddings(&self, account_id: i64, limit: usize) -> Result<Vec<EmailMessage>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM email_messages m
            WHERE m.account_id = ?
              AND NOT EXISTS (SELECT 1 FROM message_embeddings e WHERE e.message_id = m.id)
            ORDER BY m.date_sent DESC
            LIMIT ?
            "#,
            MESSAGE_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(account_id)
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(row_to_message).collect()
    }

    /// Record that a message's embedding lives in the vector store under `vector_id`
    pub async fn record_embedding(&self, record: &EmbeddingRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO message_embeddings (
                message_id, field_name, embedding_model, vector_id, vector_dimensions, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.message_id)
        .bind(&record.field_name)
        .bind(&record.embedding_model)
        .bind(&record.vector_id)
        .bind(record.vector_dimensions as i64)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Forget every recorded embedding so the next sync re-embeds all messages.
    /// Returns the number of rows removed.
    pub async fn clear_embeddings(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message_embeddings").execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn query_by_keywords(
        &self,
        account_id: i64,
        keywords: &[String],
        cap: usize,
    ) -> Result<Vec<EmailMessage>> {
        let mut sql = format!("SELECT {} FROM email_messages m WHERE m.account_id = ?", MESSAGE_COLUMNS);
        for _ in keywords {
            sql.push_str(
                " AND (LOWER(COALESCE(m.subject, '')) LIKE ? ESCAPE '\\' \
                 OR LOWER(COALESCE(m.snippet, '')) LIKE ? ESCAPE '\\')",
            );
        }
        sql.push_str(" ORDER BY m.date_sent DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(account_id);
        for keyword in keywords {
            let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));
            query = query.bind(pattern.clone()).bind(pattern);
        }
        query = query.bind(cap as i64);

        let rows = query.fetch_all(&self.db).await?;
        debug!("Keyword query for account {} matched {} rows", account_id, rows.len());

        rows.iter().map(row_to_message).collect()
    }

    async fn resolve_vector(&self, account_id: i64, vector_id: &str) -> Result<Option<EmailMessage>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM message_embeddings e
            JOIN email_messages m ON m.id = e.message_id
            WHERE e.vector_id = ? AND m.account_id = ?
            "#,
            MESSAGE_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(vector_id)
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?;
        row.map(|row| row_to_message(&row)).transpose()
    }
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn row_to_message(row: &SqliteRow) -> Result<EmailMessage> {
    let labels_json: Option<String> = row.try_get("labels")?;
    let labels: Vec<String> = labels_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    let date_sent_str: String = row.try_get("date_sent")?;
    let date_sent = DateTime::parse_from_rfc3339(&date_sent_str)
        .map_err(|e| SearchError::Parse(format!("Invalid date_sent {}: {}", date_sent_str, e)))?
        .with_timezone(&Utc);

    Ok(EmailMessage {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        external_message_id: row.try_get("external_message_id")?,
        thread_id: row.try_get("thread_id")?,
        sender_email: row.try_get("sender_email")?,
        sender_name: row.try_get::<Option<String>, _>("sender_name")?.unwrap_or_default(),
        subject: row.try_get::<Option<String>, _>("subject")?.unwrap_or_default(),
        snippet: row.try_get::<Option<String>, _>("snippet")?.unwrap_or_default(),
        date_sent,
        labels,
        is_important: row.try_get("is_important")?,
        has_attachments: row.try_get("has_attachments")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn setup_store() -> SqliteMessageStore {
        SqliteMessageStore::connect("sqlite::memory:").await.unwrap()
    }

    fn message(account_id: i64, external_id: &str, subject: &str, snippet: &str, days_ago: i64) -> NewEmailMessage {
        NewEmailMessage {
            account_id,
            external_message_id: external_id.to_string(),
            thread_id: None,
            sender_email: "alice@example.com".to_string(),
            sender_name: "Alice".to_string(),
            subject: subject.to_string(),
            snippet: snippet.to_string(),
            date_sent: Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap() - Duration::days(days_ago),
            labels: vec!["INBOX".to_string()],
            is_important: false,
            has_attachments: false,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_external_id() {
        let store = setup_store().await;
        let first = store.upsert_message(&message(1, "g-1", "Hello", "", 0)).await.unwrap();
        let second = store.upsert_message(&message(1, "g-1", "Hello again", "", 0)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count_messages(1).await.unwrap(), 1);

        let stored = store.get_message(first).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Hello again");
        assert_eq!(stored.labels, vec!["INBOX"]);
    }

    #[tokio::test]
    async fn test_keywords_are_conjunctive_and_account_scoped() {
        let store = setup_store().await;
        store.upsert_message(&message(1, "a", "Budget review", "numbers for Q3", 3)).await.unwrap();
        store.upsert_message(&message(1, "b", "Budget", "lunch plans", 2)).await.unwrap();
        store.upsert_message(&message(1, "c", "Lunch", "nothing here", 1)).await.unwrap();
        store.upsert_message(&message(2, "d", "Budget review", "other account", 0)).await.unwrap();

        let hits = store
            .query_by_keywords(1, &["budget".to_string(), "lunch".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_message_id, "b");

        let hits = store.query_by_keywords(1, &["BUDGET".to_string()], 10).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|m| m.external_message_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_no_keywords_returns_most_recent() {
        let store = setup_store().await;
        for i in 0..5 {
            store
                .upsert_message(&message(1, &format!("m{}", i), "Subject", "", i))
                .await
                .unwrap();
        }

        let hits = store.query_by_keywords(1, &[], 3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|m| m.external_message_id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn test_like_wildcards_are_literal() {
        let store = setup_store().await;
        store.upsert_message(&message(1, "a", "100% done", "", 0)).await.unwrap();
        store.upsert_message(&message(1, "b", "1000 items", "", 0)).await.unwrap();

        let hits = store.query_by_keywords(1, &["100%".to_string()], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_message_id, "a");
    }

    #[tokio::test]
    async fn test_resolve_vector_and_pending_embeddings() {
        let store = setup_store().await;
        let id = store.upsert_message(&message(1, "a", "Invoice", "", 1)).await.unwrap();
        store.upsert_message(&message(1, "b", "Receipt", "", 0)).await.unwrap();

        store
            .record_embedding(&EmbeddingRecord {
                message_id: id,
                vector_id: "vec-a".to_string(),
                field_name: "subject_snippet".to_string(),
                embedding_model: "hash".to_string(),
                vector_dimensions: 8,
            })
            .await
            .unwrap();

        let resolved = store.resolve_vector(1, "vec-a").await.unwrap().unwrap();
        assert_eq!(resolved.id, id);
        assert!(store.resolve_vector(1, "missing").await.unwrap().is_none());
        // another account's vector never resolves
        assert!(store.resolve_vector(2, "vec-a").await.unwrap().is_none());

        let pending = store.messages_without_embeddings(1, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].external_message_id, "b");

        assert_eq!(store.clear_embeddings().await.unwrap(), 1);
        assert!(store.resolve_vector(1, "vec-a").await.unwrap().is_none());
        assert_eq!(store.messages_without_embeddings(1, 10).await.unwrap().len(), 2);
    }
}
