//! Per-assistant vector store handles.
//!
//! [`StoreAccessor::get`] returns the [`VectorIndex`] for an assistant id,
//! creating it on first use and caching it afterwards. The cache is a
//! small keyed LRU: with the default capacity of 1 it behaves as a
//! single-slot memo, and a different id replaces the cached handle.
//!
//! The store endpoint is resolved only when a handle is created. A cache
//! hit never touches the environment or the backend. A failed creation
//! leaves nothing behind, so the next call for that id tries again.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{create_provider, embed_in_batches, Embedder};
use crate::error::IngestError;
use crate::models::{Chunk, SearchHit, StoredRecord};
use crate::store::{open_store, VectorStore};

/// Factory for the backend behind a new [`VectorIndex`].
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(&self, assistant_id: &str) -> Result<Box<dyn VectorStore>, IngestError>;
}

/// Opens the endpoint named by an environment variable.
///
/// The variable is read on every `open`, so a changed value takes effect
/// for the next handle created.
pub struct EnvStoreOpener {
    url_env: String,
}

impl EnvStoreOpener {
    pub fn new(url_env: impl Into<String>) -> Self {
        Self {
            url_env: url_env.into(),
        }
    }

    pub fn url_env(&self) -> &str {
        &self.url_env
    }
}

#[async_trait]
impl StoreOpener for EnvStoreOpener {
    async fn open(&self, assistant_id: &str) -> Result<Box<dyn VectorStore>, IngestError> {
        let endpoint = std::env::var(&self.url_env).map_err(|_| {
            IngestError::Config(format!(
                "environment variable {} is not set",
                self.url_env
            ))
        })?;
        open_store(&endpoint, assistant_id)
            .await
            .map_err(IngestError::Store)
    }
}

/// A vector store handle bound to one assistant id and an embedder.
pub struct VectorIndex {
    assistant_id: String,
    store: Box<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    embed_batch_size: usize,
}

impl VectorIndex {
    pub fn new(
        assistant_id: impl Into<String>,
        store: Box<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        embed_batch_size: usize,
    ) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            store,
            embedder,
            embed_batch_size,
        }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    /// Embed and store `chunks`, returning one record id per chunk.
    ///
    /// Ids have the form `doc:{assistant_id}:{uuid}` and are fresh on every
    /// call, so writing the same chunks twice yields disjoint ids.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<Vec<String>, IngestError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.embed_batch_size)
            .await
            .map_err(IngestError::Embedding)?;

        let records: Vec<StoredRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| StoredRecord {
                id: format!("doc:{}:{}", self.assistant_id, uuid::Uuid::new_v4()),
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                mime_type: chunk.mime_type.clone(),
                chunk_index: chunk.index,
                hash: chunk.hash.clone(),
                title: chunk.title.clone(),
                embedding,
            })
            .collect();

        self.store.add(&records).await.map_err(IngestError::Store)
    }

    /// Embed `query` and return the `k` closest records.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, IngestError> {
        let vectors = embed_in_batches(self.embedder.as_ref(), &[query.to_string()], 1)
            .await
            .map_err(IngestError::Embedding)?;
        let query_vec = vectors.into_iter().next().unwrap_or_default();
        self.store
            .similarity_search(&query_vec, k)
            .await
            .map_err(IngestError::Store)
    }
}

/// Memoized, keyed access to [`VectorIndex`] handles.
pub struct StoreAccessor {
    opener: Arc<dyn StoreOpener>,
    embedder: Arc<dyn Embedder>,
    embed_batch_size: usize,
    capacity: usize,
    /// Most recently used last.
    cache: Mutex<Vec<(String, Arc<VectorIndex>)>>,
}

impl StoreAccessor {
    pub fn new(opener: Arc<dyn StoreOpener>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            opener,
            embedder,
            embed_batch_size: 64,
            capacity: 1,
            cache: Mutex::new(Vec::new()),
        }
    }

    /// Maximum number of cached handles (at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_embed_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size.max(1);
        self
    }

    /// Build an accessor from config: an [`EnvStoreOpener`] on
    /// `[store].url_env` and the configured embedding provider.
    pub fn from_config(config: &Config) -> Result<Self, IngestError> {
        if !config.embedding.is_enabled() {
            tracing::warn!("embedding provider is disabled; only uploads without text can be stored");
        }
        let embedder = create_provider(&config.embedding)
            .map_err(|e| IngestError::Config(format!("{e:#}")))?;
        Ok(Self::new(
            Arc::new(EnvStoreOpener::new(config.store.url_env.clone())),
            embedder,
        )
        .with_capacity(config.store.cache_capacity)
        .with_embed_batch_size(config.embedding.batch_size))
    }

    /// Ids currently cached, least recently used first.
    pub async fn cached_ids(&self) -> Vec<String> {
        self.cache
            .lock()
            .await
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Return the handle for `assistant_id`, creating it if it is not cached.
    ///
    /// The cache lock is held across creation, so concurrent calls for the
    /// same id create at most one handle.
    pub async fn get(&self, assistant_id: &str) -> Result<Arc<VectorIndex>, IngestError> {
        let mut cache = self.cache.lock().await;

        if let Some(pos) = cache.iter().position(|(id, _)| id == assistant_id) {
            let entry = cache.remove(pos);
            let index = Arc::clone(&entry.1);
            cache.push(entry);
            tracing::debug!(assistant_id, "vector store cache hit");
            return Ok(index);
        }

        tracing::debug!(assistant_id, "vector store cache miss; opening");
        let store = self.opener.open(assistant_id).await?;
        let index = Arc::new(VectorIndex::new(
            assistant_id,
            store,
            Arc::clone(&self.embedder),
            self.embed_batch_size,
        ));

        while cache.len() >= self.capacity {
            let (evicted, _) = cache.remove(0);
            tracing::debug!(evicted = %evicted, "evicting vector store handle");
        }
        cache.push((assistant_id.to_string(), Arc::clone(&index)));

        Ok(index)
    }
}
