//! Content-based MIME type detection.
//!
//! Detection looks only at the bytes, never at the file name. Binary
//! formats are recognised by magic numbers through the `infer` crate
//! (cargo feature `sniff`, enabled by default). ZIP containers that
//! `infer` cannot pin down are opened and classified by their main part,
//! so Office packages are recognised whatever their entry order. Text
//! that carries no signature is classified by a few cheap heuristics.
//!
//! A build without the `sniff` feature cannot construct a [`MimeSniffer`]:
//! [`MimeSniffer::probe`] fails with [`IngestError::MissingCapability`]
//! instead of silently falling back to a default type. Binaries run the
//! probe at startup, before accepting input.

use crate::error::IngestError;

pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_HTML: &str = "text/html";
pub const MIME_XML: &str = "text/xml";
pub const MIME_JSON: &str = "application/json";
pub const MIME_ZIP: &str = "application/zip";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const OOXML_PREFIX: &str = "application/vnd.openxmlformats-officedocument";
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Main part of each Office package type.
const OOXML_MAIN_PARTS: [(&str, &str); 3] = [
    ("word/document.xml", MIME_DOCX),
    ("ppt/presentation.xml", MIME_PPTX),
    ("xl/workbook.xml", MIME_XLSX),
];

/// How much of a text buffer the heuristics look at.
const TEXT_SNIFF_WINDOW: usize = 512;

/// Proof that content sniffing is available in this build.
#[derive(Debug, Clone, Copy)]
pub struct MimeSniffer {
    _probed: (),
}

impl MimeSniffer {
    /// Check that a content sniffer is compiled in.
    pub fn probe() -> Result<Self, IngestError> {
        #[cfg(feature = "sniff")]
        {
            Ok(Self { _probed: () })
        }
        #[cfg(not(feature = "sniff"))]
        {
            Err(IngestError::MissingCapability(
                "content sniffing is not available; rebuild with `--features sniff`".to_string(),
            ))
        }
    }

    /// Name of the magic-number backend, for diagnostics.
    pub fn backend(&self) -> &'static str {
        "infer"
    }

    /// Guess the MIME type of `bytes`.
    pub fn sniff(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return MIME_EMPTY.to_string();
        }
        let magic = sniff_magic(bytes);
        if is_unclassified_zip(magic, bytes) {
            if let Some(mime) = ooxml_main_part(bytes) {
                return mime.to_string();
            }
        }
        if let Some(mime) = magic {
            return mime.to_string();
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => sniff_text(text).to_string(),
            Err(_) => MIME_OCTET_STREAM.to_string(),
        }
    }
}

/// Probe and sniff in one step.
pub fn guess_mimetype(bytes: &[u8]) -> Result<String, IngestError> {
    Ok(MimeSniffer::probe()?.sniff(bytes))
}

#[cfg(feature = "sniff")]
fn sniff_magic(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

#[cfg(not(feature = "sniff"))]
fn sniff_magic(_bytes: &[u8]) -> Option<&'static str> {
    None
}

/// A ZIP container whose Office type, if any, is still unknown.
fn is_unclassified_zip(magic: Option<&str>, bytes: &[u8]) -> bool {
    match magic {
        Some(mime) if mime == MIME_ZIP => true,
        Some(mime) if mime.starts_with(OOXML_PREFIX) => {
            !matches!(mime, MIME_DOCX | MIME_PPTX | MIME_XLSX)
        }
        Some(_) => false,
        None => bytes.starts_with(ZIP_SIGNATURE),
    }
}

fn ooxml_main_part(bytes: &[u8]) -> Option<&'static str> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).ok()?;
    OOXML_MAIN_PARTS
        .iter()
        .find(|(part, _)| archive.index_for_name(part).is_some())
        .map(|(_, mime)| *mime)
}

fn sniff_text(text: &str) -> &'static str {
    let head = text.trim_start_matches('\u{feff}').trim_start();
    let window: String = head
        .chars()
        .take(TEXT_SNIFF_WINDOW)
        .collect::<String>()
        .to_ascii_lowercase();

    if window.starts_with("<!doctype html")
        || window.starts_with("<html")
        || window.starts_with("<head")
        || window.starts_with("<body")
        || (window.starts_with('<') && window.contains("<html"))
    {
        return MIME_HTML;
    }
    if window.starts_with("<?xml") {
        return MIME_XML;
    }
    if (head.starts_with('{') || head.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(head).is_ok()
    {
        return MIME_JSON;
    }
    MIME_TEXT
}

#[cfg(all(test, feature = "sniff"))]
mod tests {
    use super::*;

    fn sniff(bytes: &[u8]) -> String {
        MimeSniffer::probe().unwrap().sniff(bytes)
    }

    fn zip_with(entries: &[&str]) -> Vec<u8> {
        use std::io::Write;
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for name in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(b"<x/>").unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn probe_succeeds_with_feature() {
        let sniffer = MimeSniffer::probe().unwrap();
        assert_eq!(sniffer.backend(), "infer");
    }

    #[test]
    fn pdf_signature() {
        assert_eq!(sniff(b"%PDF-1.4\n1 0 obj\n"), "application/pdf");
    }

    #[test]
    fn png_signature() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        assert_eq!(sniff(&png), "image/png");
    }

    #[test]
    fn minimal_office_packages_classified_by_main_part() {
        let docx = zip_with(&["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
        assert_eq!(sniff(&docx), MIME_DOCX);

        let pptx = zip_with(&["[Content_Types].xml", "_rels/.rels", "ppt/presentation.xml"]);
        assert_eq!(sniff(&pptx), MIME_PPTX);

        let xlsx = zip_with(&["[Content_Types].xml", "_rels/.rels", "xl/workbook.xml"]);
        assert_eq!(sniff(&xlsx), MIME_XLSX);
    }

    #[test]
    fn plain_zip_stays_zip() {
        let archive = zip_with(&["readme.txt", "data/values.csv"]);
        assert_eq!(sniff(&archive), MIME_ZIP);
    }

    #[test]
    fn plain_text() {
        assert_eq!(sniff(b"Just some notes about the quarterly plan."), MIME_TEXT);
    }

    #[test]
    fn html_document() {
        let html = b"<!DOCTYPE html><html><head><title>t</title></head><body>hi</body></html>";
        assert_eq!(sniff(html), MIME_HTML);
    }

    #[test]
    fn json_document() {
        assert_eq!(sniff(br#"{"name": "alpha", "tags": [1, 2]}"#), MIME_JSON);
    }

    #[test]
    fn broken_json_is_plain_text() {
        assert_eq!(sniff(b"{ not json at all"), MIME_TEXT);
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(sniff(b""), MIME_EMPTY);
    }

    #[test]
    fn non_utf8_binary() {
        assert_eq!(sniff(&[0x13, 0x37, 0x80, 0x81, 0x99, 0xC3]), MIME_OCTET_STREAM);
    }

    #[test]
    fn deterministic_for_equal_input() {
        let bytes = b"line one\nline two\n";
        let first = sniff(bytes);
        for _ in 0..5 {
            assert_eq!(sniff(bytes), first);
        }
        assert_eq!(guess_mimetype(bytes).unwrap(), first);
    }
}
