//! Immutable in-memory file wrapper.

use std::borrow::Cow;
use std::io::Read;

use crate::error::IngestError;
use crate::models::NamedStream;
use crate::sniff::MimeSniffer;

/// Raw bytes of one uploaded file plus its display name and sniffed type.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Vec<u8>,
    name: String,
    mime_type: String,
}

impl Blob {
    /// Read `stream` to completion and sniff its content type.
    ///
    /// The whole file is held in memory. A read failure is returned as
    /// [`IngestError::Read`] with the stream's name.
    pub fn from_stream(stream: NamedStream, sniffer: &MimeSniffer) -> Result<Self, IngestError> {
        let NamedStream { name, mut reader } = stream;
        let mut data = Vec::new();
        if let Err(source) = reader.read_to_end(&mut data) {
            return Err(IngestError::Read { name, source });
        }
        let mime_type = sniffer.sniff(&data);
        tracing::debug!(name = %name, bytes = data.len(), mime_type = %mime_type, "sniffed blob");
        Ok(Self {
            data,
            name,
            mime_type,
        })
    }

    /// Build a blob whose content type is already known.
    pub fn from_parts(
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the bytes as UTF-8, replacing invalid sequences.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
