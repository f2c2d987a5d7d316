//! In-memory [`VectorStore`] for tests and throwaway runs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{top_k, VectorStore};
use crate::embedding::cosine_similarity;
use crate::models::{SearchHit, StoredRecord};

pub struct InMemoryVectorStore {
    index_name: String,
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            records: RwLock::new(Vec::new()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn add(&self, records: &[StoredRecord]) -> Result<Vec<String>> {
        let mut stored = self.records.write().map_err(poisoned)?;
        stored.extend_from_slice(records);
        Ok(records.iter().map(|r| r.id.clone()).collect())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let stored = self.records.read().map_err(poisoned)?;
        let scored = stored
            .iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                text: r.text.clone(),
                source: r.source.clone(),
                title: r.title.clone(),
                score: cosine_similarity(query, &r.embedding) as f64,
            })
            .collect();
        Ok(top_k(scored, k))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().map_err(poisoned)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            text: format!("text of {id}"),
            source: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            chunk_index: 0,
            hash: String::new(),
            title: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn add_returns_ids_in_order() {
        let store = InMemoryVectorStore::new("a");
        let ids = store
            .add(&[record("r1", vec![1.0, 0.0]), record("r2", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine() {
        let store = InMemoryVectorStore::new("a");
        store
            .add(&[
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.1]),
                record("mid", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();
        let hits = store.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
    }
}
