//! Error taxonomy for the ingestion pipeline.
//!
//! Backends and providers return `anyhow::Result`; the orchestrator maps
//! those into [`IngestError`] at its boundary so callers can match on the
//! failure class. Nothing here is recovered locally: the first error of a
//! batch is the error of the whole call.

use thiserror::Error;

use crate::parse::ParseError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// A required capability (e.g. content sniffing) is not compiled in.
    #[error("missing capability: {0}")]
    MissingCapability(String),

    /// The call carried no assistant id, or a blank one.
    #[error("assistant_id must be provided")]
    MissingAssistantId,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read stream '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },

    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("vector store error: {0:#}")]
    Store(anyhow::Error),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_stream() {
        let err = IngestError::Read {
            name: "notes.txt".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
        };
        let msg = err.to_string();
        assert!(msg.contains("notes.txt"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn store_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("opening index");
        let msg = IngestError::Store(inner).to_string();
        assert!(msg.contains("opening index"));
        assert!(msg.contains("connection refused"));
    }
}
