//! Vector store persisted in SQLite
//!
//! Vectors are stored as little-endian `f32` blobs next to the message
//! tables. Similarity search is a brute-force cosine scan, the same as
//! [`MemoryVectorStore`](super::MemoryVectorStore), but survives restarts.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::memory::cosine_similarity;
use super::{VectorHit, VectorStore};
use crate::error::{Result, SearchError};

#[derive(Clone)]
pub struct SqliteVectorStore {
    db: SqlitePool,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Use `db` for vector storage, creating the table if needed
    pub async fn new(db: SqlitePool, dimensions: usize) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_vectors (
                vector_id TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL,
                vector BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db, dimensions })
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

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SearchError::VectorStore(format!(
            "corrupt vector blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        cap: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>> {
        self.check_dimensions(vector)?;

        let rows = sqlx::query("SELECT vector_id, vector FROM embedding_vectors WHERE dimensions = ?")
            .bind(self.dimensions as i64)
            .fetch_all(&self.db)
            .await?;

        let mut hits = Vec::new();
        for row in &rows {
            let bytes: Vec<u8> = row.try_get("vector")?;
            let score = cosine_similarity(vector, &decode_vector(&bytes)?);
            if score >= score_threshold {
                hits.push(VectorHit {
                    vector_id: row.try_get("vector_id")?,
                    score,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_id.cmp(&b.vector_id))
        });
        hits.truncate(cap);

        debug!("Vector scan over {} rows returned {} hits", rows.len(), hits.len());
        Ok(hits)
    }

    async fn upsert(&self, vector_id: &str, vector: Vec<f32>) -> Result<()> {
        self.check_dimensions(&vector)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO embedding_vectors (vector_id, dimensions, vector, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(vector_id)
        .bind(vector.len() as i64)
        .bind(encode_vector(&vector))
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_vectors")
            .fetch_one(&self.db)
            .await?;
        Ok(count as usize)
    }
}
