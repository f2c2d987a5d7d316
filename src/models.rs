//! Core data types that flow through the ingestion pipeline.
//!
//! A [`NamedStream`] is read into a [`Blob`](crate::blob::Blob), parsed into
//! [`ParsedDocument`]s, split into [`Chunk`]s and stored as
//! [`StoredRecord`]s. Similarity search returns [`SearchHit`]s.

use std::fmt;
use std::io::Read;
use std::path::Path;

/// A named, readable input stream (one uploaded file).
pub struct NamedStream {
    pub name: String,
    pub reader: Box<dyn Read + Send>,
}

impl NamedStream {
    pub fn new(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, std::io::Cursor::new(bytes.into()))
    }

    /// Open a file; the display name is the path as given.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(path.display().to_string(), file))
    }
}

impl fmt::Debug for NamedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedStream")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Metadata attached to a parsed document and carried into its chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub mime_type: String,
    pub title: Option<String>,
}

/// Text produced by a parser for one blob.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A chunk of a parsed document's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position within the blob, contiguous from 0.
    pub index: i64,
    pub text: String,
    pub source: String,
    pub mime_type: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
    /// Title of the parsed document, when the parser found one.
    pub title: Option<String>,
}

/// A chunk as persisted by a vector store backend.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub source: String,
    pub mime_type: String,
    pub chunk_index: i64,
    pub hash: String,
    pub title: Option<String>,
    pub embedding: Vec<f32>,
}

/// A similarity search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub title: Option<String>,
    pub score: f64,
}
