//! Types produced by the extractors and consumed by the processor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Title used when a document carries none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Author used when a document carries none
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Epub,
    Pdf,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Epub => "epub",
            SourceFormat::Pdf => "pdf",
        }
    }

    /// Match an explicit tag such as `"EPUB"` or `"pdf"`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "epub" => Some(SourceFormat::Epub),
            "pdf" => Some(SourceFormat::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized document metadata.
///
/// `title` and `author` always hold a value; the sentinels above stand in
/// when the source had none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub subject: Option<String>,
    pub rights: Option<String>,
    pub identifier: Option<String>,
    pub tags: Vec<String>,
    /// PDF document-info only
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub modified_date: Option<String>,
}

impl Default for ParsedMetadata {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            description: None,
            language: None,
            publisher: None,
            published_date: None,
            subject: None,
            rights: None,
            identifier: None,
            tags: Vec::new(),
            creator: None,
            producer: None,
            modified_date: None,
        }
    }
}

impl ParsedMetadata {
    /// Replace the sentinels with recovered values, ignoring blanks
    pub fn with_title_and_author(mut self, title: Option<String>, author: Option<String>) -> Self {
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.title = title.trim().to_string();
        }
        if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
            self.author = author.trim().to_string();
        }
        self
    }
}

/// One persisted unit of text. Numbers are 1-based and dense per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub content: String,
    pub chapter_number: Option<u32>,
    pub chapter_title: Option<String>,
}

/// A chapter detected in an EPUB content document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub content: String,
    /// Archive path of the content document
    pub source: String,
}

/// Raw cover image bytes and where they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    /// Archive path for EPUB covers, `page-1` for rendered PDF covers
    pub path: String,
    pub media_type: Option<String>,
}

impl CoverImage {
    /// File extension for the saved image
    pub fn extension(&self) -> &str {
        if let Some(ext) = std::path::Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
        {
            return ext;
        }
        match self.media_type.as_deref() {
            Some("image/jpeg") => "jpg",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            Some("image/svg+xml") => "svg",
            _ => "png",
        }
    }
}

/// Which stage of the PDF page-count cascade produced the total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCountSource {
    Primary,
    PageTree,
    CountEntries,
    PageObjects,
    TextEstimate,
    ContentSegments,
}

/// Figures collected during a parse, for logging only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostics {
    /// EPUB content documents selected, or PDF text segments seen
    pub content_files: usize,
    pub word_count: usize,
    pub page_count_source: Option<PageCountSource>,
}

/// Normalized output of an extractor
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub format: SourceFormat,
    pub metadata: ParsedMetadata,
    pub pages: Vec<Page>,
    pub total_pages: u32,
    pub cover_image: Option<CoverImage>,
    pub diagnostics: ParseDiagnostics,
}

impl ParseResult {
    /// Page numbers are exactly `1..=total_pages`, in order
    pub fn is_dense(&self) -> bool {
        self.pages.len() == self.total_pages as usize
            && self
                .pages
                .iter()
                .enumerate()
                .all(|(i, p)| p.page_number as usize == i + 1)
    }
}
