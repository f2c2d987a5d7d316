//! Ingestion pipeline orchestration.
//!
//! Drives each uploaded stream through the full flow:
//! read → sniff → parse → chunk → embed → store. Items are processed one
//! at a time in list order, and each item's chunks are written in groups
//! of `[ingest].write_batch_size`.
//!
//! A call either returns every record id it produced or an error. Records
//! written for earlier items before a failure stay in the store.

use std::sync::Arc;

use crate::accessor::{StoreAccessor, VectorIndex};
use crate::blob::Blob;
use crate::chunk::TextChunker;
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{Chunk, NamedStream};
use crate::parse::ParserRegistry;
use crate::sniff::MimeSniffer;

/// Per-call parameters.
#[derive(Debug, Clone, Default)]
pub struct IngestContext {
    /// Selects the vector index the records are written to. Required.
    pub assistant_id: Option<String>,
}

impl IngestContext {
    pub fn for_assistant(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: Some(assistant_id.into()),
        }
    }

    /// The assistant id as given. Absent or whitespace-only ids are
    /// missing; any other id is used verbatim.
    pub fn require_assistant_id(&self) -> Result<&str, IngestError> {
        match self.assistant_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(IngestError::MissingAssistantId),
        }
    }
}

pub struct IngestPipeline {
    sniffer: MimeSniffer,
    parsers: ParserRegistry,
    chunker: TextChunker,
    accessor: Arc<StoreAccessor>,
    write_batch_size: usize,
}

impl IngestPipeline {
    /// Build a pipeline, failing if content sniffing is unavailable.
    pub fn new(config: &Config, accessor: Arc<StoreAccessor>) -> Result<Self, IngestError> {
        let sniffer = MimeSniffer::probe()?;
        let chunker = TextChunker::from_config(&config.chunking)?;
        if config.ingest.write_batch_size == 0 {
            return Err(IngestError::Config(
                "ingest.write_batch_size must be > 0".to_string(),
            ));
        }
        tracing::debug!(
            sniffer = sniffer.backend(),
            chunk_size = chunker.chunk_size(),
            overlap = chunker.overlap(),
            write_batch_size = config.ingest.write_batch_size,
            "ingest pipeline ready"
        );
        Ok(Self {
            sniffer,
            parsers: ParserRegistry::default(),
            chunker,
            accessor,
            write_batch_size: config.ingest.write_batch_size,
        })
    }

    pub fn accessor(&self) -> &Arc<StoreAccessor> {
        &self.accessor
    }

    /// Ingest a single stream.
    pub async fn invoke(
        &self,
        stream: NamedStream,
        ctx: &IngestContext,
    ) -> Result<Vec<String>, IngestError> {
        self.batch(vec![stream], ctx).await
    }

    /// Ingest `streams` in order and return the concatenated record ids.
    ///
    /// The assistant id is checked before any stream is read or any store
    /// is opened. The first failure aborts the rest of the batch.
    #[tracing::instrument(
        name = "ingest_batch",
        skip_all,
        fields(assistant_id = ctx.assistant_id.as_deref().unwrap_or(""), items = streams.len())
    )]
    pub async fn batch(
        &self,
        streams: Vec<NamedStream>,
        ctx: &IngestContext,
    ) -> Result<Vec<String>, IngestError> {
        let assistant_id = ctx.require_assistant_id()?;
        if streams.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.accessor.get(assistant_id).await?;

        let mut ids = Vec::new();
        for stream in streams {
            let item_ids = self.ingest_one(&index, stream).await?;
            ids.extend(item_ids);
        }

        tracing::info!(records = ids.len(), "batch ingested");
        Ok(ids)
    }

    async fn ingest_one(
        &self,
        index: &VectorIndex,
        stream: NamedStream,
    ) -> Result<Vec<String>, IngestError> {
        let blob = Blob::from_stream(stream, &self.sniffer)?;
        let chunks = self.chunk_blob(&blob)?;

        let mut ids = Vec::with_capacity(chunks.len());
        for group in chunks.chunks(self.write_batch_size) {
            ids.extend(index.add_chunks(group).await?);
        }

        tracing::info!(
            name = blob.name(),
            mime_type = blob.mime_type(),
            bytes = blob.len(),
            chunks = chunks.len(),
            "item ingested"
        );
        Ok(ids)
    }

    /// Parse and split a blob. Chunk indices run contiguously across all
    /// documents the parser produced.
    pub fn chunk_blob(&self, blob: &Blob) -> Result<Vec<Chunk>, IngestError> {
        let documents = self
            .parsers
            .parse(blob)
            .map_err(|source| IngestError::Parse {
                name: blob.name().to_string(),
                source,
            })?;

        let mut chunks = Vec::new();
        for document in &documents {
            let next = chunks.len() as i64;
            chunks.extend(self.chunker.split(document, next));
        }
        Ok(chunks)
    }
}
