//! Overlapping character-window chunker.
//!
//! Splitting is delegated to the `text-splitter` crate: chunks hold at most
//! `chunk_size` characters and neighbouring chunks share up to `overlap`
//! characters, with splits preferring semantic boundaries (paragraphs,
//! sentences, words) over hard cuts.
//!
//! Each chunk carries its source metadata, a contiguous index within the
//! blob and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

use crate::config::ChunkingConfig;
use crate::error::IngestError;
use crate::models::{Chunk, ParsedDocument};

pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::Chunking("chunk size must be > 0".to_string()));
        }
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(overlap)
            .map_err(|e| IngestError::Chunking(format!("invalid chunk overlap: {e}")))?;
        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, IngestError> {
        Self::new(config.chunk_size, config.overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Raw chunk texts for `text`, in order.
    pub fn split_text<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.splitter.chunks(text).collect()
    }

    /// Split a parsed document, numbering chunks from `start_index`.
    pub fn split(&self, document: &ParsedDocument, start_index: i64) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .zip(start_index..)
            .map(|(piece, index)| make_chunk(document, index, piece))
            .collect()
    }
}

fn make_chunk(document: &ParsedDocument, index: i64, text: &str) -> Chunk {
    // NUL bytes are rejected by several vector backends.
    let text = text.replace('\0', "x");

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        index,
        text,
        source: document.metadata.source.clone(),
        mime_type: document.metadata.mime_type.clone(),
        hash,
        title: document.metadata.title.clone(),
    }
}
