//! MIME-type based parser dispatch.
//!
//! [`ParserRegistry`] picks the first registered [`DocumentParser`] that
//! supports a blob's sniffed type and returns the documents it yields.
//! There is no fallback parser: an unknown type is an error, not a guess.
//!
//! Supported out of the box:
//!
//! | MIME type | Parser |
//! |-----------|--------|
//! | `text/html` | [`HtmlParser`] (scraper) |
//! | `text/*`, `application/json`, `application/xml` | [`TextParser`] |
//! | `application/pdf` | [`PdfParser`] (pdf-extract) |
//! | DOCX, PPTX, XLSX | [`OoxmlParser`] (zip + quick-xml) |
//! | `application/x-empty` | [`EmptyParser`] (no documents) |

use std::io::Read;

use quick_xml::events::Event;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::blob::Blob;
use crate::models::{DocumentMetadata, ParsedDocument};
use crate::sniff::{MIME_EMPTY, MIME_HTML, MIME_JSON};
pub use crate::sniff::{MIME_DOCX, MIME_PPTX, MIME_XLSX};

pub const MIME_PDF: &str = "application/pdf";

const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Upper bound on decompressed bytes read from one ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// A parser for one family of content types.
pub trait DocumentParser: Send + Sync {
    fn supports(&self, mime_type: &str) -> bool;

    fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError>;
}

/// Ordered list of parsers; the first one that supports a type wins.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    pub fn register(&mut self, parser: Box<dyn DocumentParser>) {
        self.parsers.push(parser);
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        self.parsers.iter().any(|p| p.supports(mime_type))
    }

    pub fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        let parser = self
            .parsers
            .iter()
            .find(|p| p.supports(blob.mime_type()))
            .ok_or_else(|| ParseError::UnsupportedContentType(blob.mime_type().to_string()))?;
        parser.parse(blob)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(EmptyParser));
        registry.register(Box::new(HtmlParser));
        registry.register(Box::new(TextParser));
        registry.register(Box::new(PdfParser));
        registry.register(Box::new(OoxmlParser));
        registry
    }
}

fn document(blob: &Blob, text: String, title: Option<String>) -> ParsedDocument {
    ParsedDocument {
        text,
        metadata: DocumentMetadata {
            source: blob.name().to_string(),
            mime_type: blob.mime_type().to_string(),
            title,
        },
    }
}

/// Zero-byte uploads parse to nothing.
pub struct EmptyParser;

impl DocumentParser for EmptyParser {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type == MIME_EMPTY
    }

    fn parse(&self, _blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        Ok(Vec::new())
    }
}

/// UTF-8 text formats, passed through unchanged.
pub struct TextParser;

impl DocumentParser for TextParser {
    fn supports(&self, mime_type: &str) -> bool {
        (mime_type.starts_with("text/") && mime_type != MIME_HTML)
            || mime_type == MIME_JSON
            || mime_type == "application/xml"
    }

    fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        let text = std::str::from_utf8(blob.data())?;
        Ok(vec![document(blob, text.to_string(), None)])
    }
}

/// Visible text of an HTML page; script, style and head content is skipped.
pub struct HtmlParser;

impl HtmlParser {
    fn title(page: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        page.select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn visible_text(element: &ElementRef, out: &mut String) {
        for node in element.children() {
            if let Some(child) = ElementRef::wrap(node) {
                let tag = child.value().name();
                if matches!(tag, "script" | "style" | "noscript" | "head" | "template") {
                    continue;
                }
                let block = matches!(
                    tag,
                    "p" | "div"
                        | "section"
                        | "article"
                        | "h1"
                        | "h2"
                        | "h3"
                        | "h4"
                        | "h5"
                        | "h6"
                        | "br"
                        | "li"
                        | "tr"
                        | "pre"
                        | "blockquote"
                );
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
                Self::visible_text(&child, out);
                if block {
                    out.push('\n');
                }
            } else if let Some(text) = node.value().as_text() {
                out.push_str(text);
            }
        }
    }
}

impl DocumentParser for HtmlParser {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type == MIME_HTML || mime_type == "application/xhtml+xml"
    }

    fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        let source = std::str::from_utf8(blob.data())?;
        let page = Html::parse_document(source);

        let mut raw = String::new();
        Self::visible_text(&page.root_element(), &mut raw);
        let text = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(vec![document(blob, text, Self::title(&page))])
    }
}

pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn supports(&self, mime_type: &str) -> bool {
        mime_type == MIME_PDF
    }

    fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        let text = pdf_extract::extract_text_from_mem(blob.data())
            .map_err(|e| ParseError::Pdf(e.to_string()))?;
        Ok(vec![document(blob, text, None)])
    }
}

/// Word, PowerPoint and Excel (Office Open XML) documents.
pub struct OoxmlParser;

impl DocumentParser for OoxmlParser {
    fn supports(&self, mime_type: &str) -> bool {
        matches!(mime_type, MIME_DOCX | MIME_PPTX | MIME_XLSX)
    }

    fn parse(&self, blob: &Blob) -> Result<Vec<ParsedDocument>, ParseError> {
        let mut archive = open_archive(blob.data())?;
        let text = match blob.mime_type() {
            MIME_DOCX => {
                let xml = read_entry(&mut archive, "word/document.xml")?;
                paragraph_text(&xml)?
            }
            MIME_PPTX => {
                let slides = numbered_entries(&archive, "ppt/slides/slide");
                let mut parts = Vec::with_capacity(slides.len());
                for name in slides {
                    let xml = read_entry(&mut archive, &name)?;
                    parts.push(paragraph_text(&xml)?);
                }
                join_non_empty(parts, "\n\n")
            }
            MIME_XLSX => xlsx_text(&mut archive)?,
            other => return Err(ParseError::UnsupportedContentType(other.to_string())),
        };
        Ok(vec![document(blob, text, None)])
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn ooxml_err(e: impl std::fmt::Display) -> ParseError {
    ParseError::Ooxml(e.to_string())
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ParseError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ParseError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ParseError::Ooxml(format!("{name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ParseError::Ooxml(format!(
            "ZIP entry {name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(out)
}

/// Entries named `{prefix}{n}.xml`, sorted by `n`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn join_non_empty(parts: Vec<String>, sep: &str) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Text of every `<*:t>` run, one line per `<*:p>` paragraph.
fn paragraph_text(xml: &[u8]) -> Result<String, ParseError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_run_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" if !out.is_empty() && !out.ends_with('\n') => out.push('\n'),
                _ => {}
            },
            Event::Text(te) if in_run_text => {
                out.push_str(te.unescape().map_err(ooxml_err)?.as_ref());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

fn xlsx_text(archive: &mut Archive<'_>) -> Result<String, ParseError> {
    let shared = match archive.index_for_name("xl/sharedStrings.xml") {
        Some(_) => shared_strings(&read_entry(archive, "xl/sharedStrings.xml")?)?,
        None => Vec::new(),
    };
    let sheets = numbered_entries(archive, "xl/worksheets/sheet");
    let mut parts = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_entry(archive, &name)?;
        parts.push(sheet_cells(&xml, &shared)?);
    }
    Ok(join_non_empty(parts, "\n\n"))
}

fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(te) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().map_err(ooxml_err)?.as_ref());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell values of one sheet: shared strings resolved, inline strings and
/// numbers kept as written. Rows become lines, cells are tab separated.
fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<String, ParseError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut shared_cell = false;
    let mut in_value = false;
    let mut cells = 0usize;
    loop {
        if cells >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"row" if !row.is_empty() => rows.push(std::mem::take(&mut row).join("\t")),
                _ => {}
            },
            Event::Text(te) if in_value => {
                let raw = te.unescape().map_err(ooxml_err)?;
                let value = raw.trim();
                let resolved = if value.is_empty() {
                    None
                } else if shared_cell {
                    value
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared.get(i))
                        .cloned()
                } else {
                    Some(value.to_string())
                };
                if let Some(v) = resolved {
                    row.push(v);
                    cells += 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join("\t"));
    }
    Ok(rows.join("\n"))
}

#[cfg(all(test, feature = "sniff"))]
mod tests {
    use super::*;
    use crate::models::NamedStream;
    use crate::sniff::MimeSniffer;
    use std::io::Write;

    fn blob(name: &str, bytes: &[u8]) -> Blob {
        let sniffer = MimeSniffer::probe().unwrap();
        Blob::from_stream(NamedStream::from_bytes(name, bytes.to_vec()), &sniffer).unwrap()
    }

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn plain_text_passes_through() {
        let docs = ParserRegistry::default()
            .parse(&blob("a.txt", b"first line\nsecond line"))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "first line\nsecond line");
        assert_eq!(docs[0].metadata.source, "a.txt");
        assert_eq!(docs[0].metadata.mime_type, "text/plain");
    }

    #[test]
    fn html_strips_markup_and_scripts() {
        let html = br#"<!DOCTYPE html><html><head><title>Release notes</title>
            <style>body { color: red }</style></head>
            <body><h1>Version 2</h1><p>Faster <b>ingest</b>.</p>
            <script>alert("x")</script></body></html>"#;
        let docs = ParserRegistry::default().parse(&blob("n.html", html)).unwrap();
        let doc = &docs[0];
        assert_eq!(doc.metadata.title.as_deref(), Some("Release notes"));
        assert!(doc.text.contains("Version 2"));
        assert!(doc.text.contains("Faster ingest."));
        assert!(!doc.text.contains("alert"));
        assert!(!doc.text.contains("color: red"));
    }

    #[test]
    fn empty_blob_has_no_documents() {
        let docs = ParserRegistry::default().parse(&blob("e", b"")).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        let err = ParserRegistry::default().parse(&blob("i.png", &png)).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedContentType(ref m) if m == "image/png"));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        let err = ParserRegistry::default()
            .parse(&blob("bad.pdf", b"%PDF-1.4 this is not really a pdf"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Pdf(_)));
    }

    #[test]
    fn empty_registry_supports_nothing() {
        let registry = ParserRegistry::empty();
        assert!(!registry.supports("text/plain"));
        assert!(ParserRegistry::default().supports("text/plain"));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#;
        let text = paragraph_text(xml.as_bytes()).unwrap();
        assert_eq!(text, "Hello world\nSecond");
    }

    #[test]
    fn docx_archive_via_registry() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>office phrase</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = zip_with(&[("word/document.xml", xml)]);
        let doc_blob = Blob::from_parts("d.docx", bytes, MIME_DOCX);
        let parsed = ParserRegistry::default().parse(&doc_blob).unwrap();
        assert_eq!(parsed[0].text, "office phrase");
        assert_eq!(parsed[0].metadata.mime_type, MIME_DOCX);
    }

    #[test]
    fn xlsx_resolves_shared_strings() {
        let shared = r#"<sst><si><t>name</t></si><si><t>alpha</t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData><row><c t="s"><v>0</v></c><c><v>42</v></c></row><row><c t="s"><v>1</v></c></row></sheetData></worksheet>"#;
        let bytes = zip_with(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let mut archive = open_archive(&bytes).unwrap();
        assert_eq!(xlsx_text(&mut archive).unwrap(), "name\t42\nalpha");
    }

    #[test]
    fn corrupt_zip_is_an_error() {
        assert!(matches!(open_archive(b"not a zip"), Err(ParseError::Ooxml(_))));
    }
}
