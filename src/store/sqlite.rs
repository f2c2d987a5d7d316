//! SQLite-backed [`VectorStore`].
//!
//! All indexes share one `records` table, partitioned by `index_name`.
//! Embeddings are stored as little-endian `f32` blobs and searched by
//! brute-force cosine similarity over the index's rows.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{top_k, VectorStore};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{SearchHit, StoredRecord};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    index_name: String,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    ///
    /// Enables WAL journal mode and creates the parent directory when it
    /// does not exist.
    pub async fn connect(path: &Path, index_name: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        migrate(&pool).await?;

        Ok(Self {
            pool,
            index_name: index_name.to_string(),
        })
    }
}

/// Create the schema if it is missing. Safe to run on every open.
async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            index_name TEXT NOT NULL,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            hash TEXT NOT NULL,
            title TEXT,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_index_name ON records(index_name)")
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn add(&self, records: &[StoredRecord]) -> Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records (id, index_name, text, source, mime_type,
                                     chunk_index, hash, title, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(&self.index_name)
            .bind(&record.text)
            .bind(&record.source)
            .bind(&record.mime_type)
            .bind(record.chunk_index)
            .bind(&record.hash)
            .bind(&record.title)
            .bind(vec_to_blob(&record.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(records.iter().map(|r| r.id.clone()).collect())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query("SELECT id, text, source, title, embedding FROM records WHERE index_name = ?")
            .bind(&self.index_name)
            .fetch_all(&self.pool)
            .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                SearchHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    source: row.get("source"),
                    title: row.get("title"),
                    score: cosine_similarity(query, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        Ok(top_k(scored, k))
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE index_name = ?")
            .bind(&self.index_name)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }
}
