//! PDF extraction
//!
//! A pluggable primary parse recovers text and document info, the page
//! count is settled by a fallback cascade, and the text is partitioned
//! across that many pages.

pub mod backend;
pub mod cover;
pub mod page_count;
pub mod partition;

use crate::errors::IngestionError;
use crate::model::{PageCountSource, ParseDiagnostics, ParseResult, SourceFormat};
use backend::{ExtractBackend, PdfBackend};
use cover::PageRenderer;
use mindpub_common::config::IngestionConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// PDF extractor
#[derive(Clone)]
pub struct PdfExtractor {
    backend: Arc<dyn PdfBackend>,
    renderer: Option<Arc<dyn PageRenderer>>,
    timeout: Duration,
    chars_per_page: usize,
}

impl std::fmt::Debug for PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor")
            .field("backend", &self.backend.name())
            .field("renderer", &self.renderer.as_ref().map(|r| r.name()))
            .field("timeout", &self.timeout)
            .field("chars_per_page", &self.chars_per_page)
            .finish()
    }
}

impl PdfExtractor {
    pub fn new(config: &IngestionConfig) -> Self {
        let renderer = if config.render_pdf_covers {
            cover::default_renderer()
        } else {
            None
        };

        Self {
            backend: Arc::new(ExtractBackend),
            renderer,
            timeout: config.pdf_timeout(),
            chars_per_page: config.chars_per_page_estimate,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_renderer(mut self, renderer: Option<Arc<dyn PageRenderer>>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether parsed PDFs will come back with a rendered cover
    pub fn can_render_covers(&self) -> bool {
        self.renderer.is_some()
    }

    #[instrument(skip(self), fields(path = %path.display(), backend = self.backend.name()))]
    pub async fn parse(&self, path: &Path) -> Result<ParseResult, IngestionError> {
        let data: Arc<Vec<u8>> = Arc::new(tokio::fs::read(path).await?);
        let label = path.display().to_string();

        let task = {
            let data = Arc::clone(&data);
            let backend = Arc::clone(&self.backend);
            let label = label.clone();
            let chars_per_page = self.chars_per_page;
            tokio::task::spawn_blocking(move || {
                extract_pdf(&data, &label, backend.as_ref(), chars_per_page)
            })
        };

        let mut result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => return Err(IngestionError::task_failed("pdf", path, join_err)),
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "PDF parse timed out");
                return Err(IngestionError::ParseTimeout {
                    format: "pdf",
                    path: label,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if let Some(renderer) = &self.renderer {
            let renderer = Arc::clone(renderer);
            let data = Arc::clone(&data);
            match tokio::task::spawn_blocking(move || renderer.render_first_page(&data)).await {
                Ok(Ok(cover)) => result.cover_image = Some(cover),
                Ok(Err(e)) => warn!(error = %e, "Cover render failed, continuing without cover"),
                Err(e) => warn!(error = %e, "Cover render task failed, continuing without cover"),
            }
        }

        Ok(result)
    }
}

/// Synchronous extraction of an in-memory PDF, without cover rendering
pub fn extract_pdf(
    data: &[u8],
    label: &str,
    backend: &dyn PdfBackend,
    chars_per_page: usize,
) -> Result<ParseResult, IngestionError> {
    let primary = backend.parse(data).map_err(|message| IngestionError::PdfParse {
        path: label.to_string(),
        message,
    })?;

    let (total_pages, source) = page_count::resolve_page_count(data, &primary, chars_per_page)
        .ok_or_else(|| IngestionError::UndeterminedPageCount {
            path: label.to_string(),
        })?;

    if source != PageCountSource::Primary {
        info!(
            reported = primary.page_count,
            total_pages,
            source = ?source,
            "Page count resolved by fallback"
        );
    }

    let pages = partition::partition_text(&primary.text, total_pages);
    let word_count = primary.text.split_whitespace().count();

    debug!(total_pages, word_count, text_len = primary.text.len(), "PDF partitioned");

    Ok(ParseResult {
        format: SourceFormat::Pdf,
        metadata: primary.info,
        pages,
        total_pages,
        cover_image: None,
        diagnostics: ParseDiagnostics {
            content_files: primary.segments,
            word_count,
            page_count_source: Some(source),
        },
    })
}
