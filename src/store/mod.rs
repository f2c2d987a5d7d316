//! Vector store backends.
//!
//! The [`VectorStore`] trait is the storage seam behind every
//! [`VectorIndex`](crate::accessor::VectorIndex): records go in with
//! their embeddings already computed, and search takes a query vector.
//!
//! Two backends ship with the crate:
//!
//! | Endpoint | Backend |
//! |----------|---------|
//! | `memory://` | [`InMemoryVectorStore`] |
//! | `sqlite://<path>` or `sqlite:<path>` | [`SqliteVectorStore`] |
//!
//! Implementations must be `Send + Sync`; handles are shared across tasks.

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::{SearchHit, StoredRecord};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Abstract storage for embedded chunks, scoped to one index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the logical index this handle writes to.
    fn index_name(&self) -> &str;

    /// Persist `records` and return their ids in input order.
    ///
    /// Records must be durable when this returns.
    async fn add(&self, records: &[StoredRecord]) -> Result<Vec<String>>;

    /// Top `k` records by cosine similarity to `query`, best first.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Number of records in this index.
    async fn count(&self) -> Result<u64>;
}

/// A parsed store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEndpoint {
    Memory,
    Sqlite(PathBuf),
}

impl StoreEndpoint {
    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();
        if endpoint == "memory://" || endpoint == "memory:" {
            return Ok(Self::Memory);
        }
        if let Some(path) = endpoint
            .strip_prefix("sqlite://")
            .or_else(|| endpoint.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                bail!("sqlite endpoint has no path: {}", endpoint);
            }
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }
        bail!(
            "unsupported vector store endpoint '{}' (expected memory:// or sqlite://<path>)",
            endpoint
        )
    }
}

/// Open a handle on `index_name` at `endpoint`.
pub async fn open_store(endpoint: &str, index_name: &str) -> Result<Box<dyn VectorStore>> {
    match StoreEndpoint::parse(endpoint)? {
        StoreEndpoint::Memory => Ok(Box::new(InMemoryVectorStore::new(index_name))),
        StoreEndpoint::Sqlite(path) => {
            Ok(Box::new(SqliteVectorStore::connect(&path, index_name).await?))
        }
    }
}

/// Rank `(score, hit)` pairs best first and keep `k`.
pub(crate) fn top_k(mut scored: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoints() {
        assert_eq!(StoreEndpoint::parse("memory://").unwrap(), StoreEndpoint::Memory);
        assert_eq!(
            StoreEndpoint::parse("sqlite:///tmp/vectors.db").unwrap(),
            StoreEndpoint::Sqlite(PathBuf::from("/tmp/vectors.db"))
        );
        assert_eq!(
            StoreEndpoint::parse("sqlite:data/vectors.db").unwrap(),
            StoreEndpoint::Sqlite(PathBuf::from("data/vectors.db"))
        );
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(StoreEndpoint::parse("postgres://localhost/db").is_err());
        assert!(StoreEndpoint::parse("sqlite://").is_err());
        assert!(StoreEndpoint::parse("").is_err());
    }

    #[tokio::test]
    async fn open_memory_store_uses_index_name() {
        let store = open_store("memory://", "asst-1").await.unwrap();
        assert_eq!(store.index_name(), "asst-1");
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
