//! Primary PDF parse: reported page count, full text, document info

use crate::model::ParsedMetadata;
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

/// Output of a primary parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryParse {
    /// Page count as reported by the parser; may be zero
    pub page_count: u32,
    /// Concatenated text of every page
    pub text: String,
    pub info: ParsedMetadata,
    /// Non-empty form-feed separated segments in `text`
    pub segments: usize,
}

/// A parser for the first pass over a PDF.
///
/// Implementations run on a blocking thread; errors are returned as
/// messages and wrapped by the extractor.
pub trait PdfBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, data: &[u8]) -> Result<PrimaryParse, String>;
}

/// `pdf-extract` for text, `lopdf` page tree for the count
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractBackend;

impl PdfBackend for ExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn parse(&self, data: &[u8]) -> Result<PrimaryParse, String> {
        // Unloadable files fall through to the raw-byte page-count stages
        let doc = match Document::load_mem(data) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "PDF structure unreadable, deferring to raw-byte fallbacks");
                return Ok(PrimaryParse::default());
            }
        };
        let page_count = doc.get_pages().len() as u32;
        let info = document_info(&doc);

        // Text failures (unsupported font encodings mostly) leave the
        // count and metadata usable
        let text = match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Text extraction failed, continuing without text");
                String::new()
            }
        };
        let segments = count_segments(&text);

        debug!(page_count, text_len = text.len(), segments, "Primary PDF parse complete");

        Ok(PrimaryParse {
            page_count,
            text,
            info,
            segments,
        })
    }
}

/// Non-empty form-feed separated segments
pub fn count_segments(text: &str) -> usize {
    text.split('\x0c').filter(|s| !s.trim().is_empty()).count()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up `key` in `dict`, following one indirect reference
pub(crate) fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn info_string(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    match dict_entry(doc, info, key)? {
        Object::String(bytes, _) => {
            let text = decode_pdf_text(bytes);
            let text = text.trim_matches(char::from(0)).trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

/// Fields of the trailer's `/Info` dictionary
pub fn document_info(doc: &Document) -> ParsedMetadata {
    let Some(Object::Dictionary(info)) = dict_entry(doc, &doc.trailer, b"Info") else {
        return ParsedMetadata::default();
    };

    ParsedMetadata {
        subject: info_string(doc, info, b"Subject"),
        creator: info_string(doc, info, b"Creator"),
        producer: info_string(doc, info, b"Producer"),
        published_date: info_string(doc, info, b"CreationDate"),
        modified_date: info_string(doc, info, b"ModDate"),
        ..ParsedMetadata::default()
    }
    .with_title_and_author(
        info_string(doc, info, b"Title"),
        info_string(doc, info, b"Author"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UNKNOWN_AUTHOR, UNKNOWN_TITLE};
    use lopdf::{dictionary, StringFormat};

    #[test]
    fn test_decode_pdf_text() {
        assert_eq!(decode_pdf_text(b"Plain"), "Plain");
        assert_eq!(decode_pdf_text(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_pdf_text(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn test_count_segments() {
        assert_eq!(count_segments("one\x0ctwo\x0c\x0c  \x0cthree"), 3);
        assert_eq!(count_segments(""), 0);
    }

    #[test]
    fn test_document_info() {
        let mut doc = Document::with_version("1.5");
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(b"Flatland".to_vec(), StringFormat::Literal),
            "Author" => Object::String(vec![0xFE, 0xFF, 0x00, 0x45, 0x00, 0x41], StringFormat::Hexadecimal),
            "Producer" => Object::String(b"TeX".to_vec(), StringFormat::Literal),
            "CreationDate" => Object::String(b"D:18840101000000".to_vec(), StringFormat::Literal),
        });
        doc.trailer.set("Info", info_id);

        let meta = document_info(&doc);
        assert_eq!(meta.title, "Flatland");
        assert_eq!(meta.author, "EA");
        assert_eq!(meta.producer.as_deref(), Some("TeX"));
        assert_eq!(meta.published_date.as_deref(), Some("D:18840101000000"));
        assert_eq!(meta.creator, None);
    }

    #[test]
    fn test_missing_info_uses_sentinels() {
        let doc = Document::with_version("1.5");
        let meta = document_info(&doc);
        assert_eq!(meta.title, UNKNOWN_TITLE);
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_extract_backend_rejects_garbage() {
        assert!(ExtractBackend.parse(b"not a pdf").is_err());
    }
}
