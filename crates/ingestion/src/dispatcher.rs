//! Format dispatch
//!
//! Picks the extractor for a file from an explicit format tag or the
//! file name's extension.

use crate::epub::EpubExtractor;
use crate::errors::IngestionError;
use crate::model::{ParseResult, SourceFormat};
use crate::pdf::PdfExtractor;
use mindpub_common::config::IngestionConfig;
use std::path::Path;
use tracing::{debug, instrument};

/// Format of a file judged by its extension alone
pub fn get_file_type(filename: &str) -> Option<SourceFormat> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(SourceFormat::from_tag)
}

/// Resolve a declared type: an explicit tag first, then a file name
pub fn resolve_format(declared: &str) -> Result<SourceFormat, IngestionError> {
    SourceFormat::from_tag(declared)
        .or_else(|| get_file_type(declared))
        .ok_or_else(|| {
            let ext = Path::new(declared)
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or(declared);
            IngestionError::UnsupportedFormat(ext.to_string())
        })
}

/// Routes files to the matching extractor
#[derive(Debug, Clone)]
pub struct Dispatcher {
    epub: EpubExtractor,
    pdf: PdfExtractor,
}

impl Dispatcher {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            epub: EpubExtractor::new(config),
            pdf: PdfExtractor::new(config),
        }
    }

    pub fn from_extractors(epub: EpubExtractor, pdf: PdfExtractor) -> Self {
        Self { epub, pdf }
    }

    pub fn epub(&self) -> &EpubExtractor {
        &self.epub
    }

    pub fn pdf(&self) -> &PdfExtractor {
        &self.pdf
    }

    /// Parse `path` with the extractor selected by `declared`
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn parse_file(
        &self,
        path: &Path,
        declared: &str,
    ) -> Result<ParseResult, IngestionError> {
        let format = resolve_format(declared)?;
        debug!(%format, "Dispatching to extractor");

        match format {
            SourceFormat::Epub => self.epub.parse(path).await,
            SourceFormat::Pdf => self.pdf.parse(path).await,
        }
    }
}
