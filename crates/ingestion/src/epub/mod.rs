//! EPUB extraction
//!
//! Reads the container, the OPF package and the content documents of an
//! EPUB archive and paginates the chapter text.

pub mod content;
pub mod cover;
pub mod opf;

use crate::errors::IngestionError;
use crate::model::{ParseDiagnostics, ParseResult, SourceFormat};
use crate::paginate::Paginator;
use content::ContentOrdering;
use mindpub_common::config::IngestionConfig;
use opf::OpfPackage;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// EPUB extractor
#[derive(Clone)]
pub struct EpubExtractor {
    words_per_page: usize,
    timeout: Duration,
    ordering: Arc<dyn ContentOrdering>,
}

impl std::fmt::Debug for EpubExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpubExtractor")
            .field("words_per_page", &self.words_per_page)
            .field("timeout", &self.timeout)
            .field("ordering", &self.ordering.name())
            .finish()
    }
}

impl EpubExtractor {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            words_per_page: config.words_per_page,
            timeout: config.epub_timeout(),
            ordering: content::ordering_for(config.content_ordering),
        }
    }

    pub fn with_ordering(mut self, ordering: Arc<dyn ContentOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse an EPUB file on a blocking thread, bounded by the configured timeout
    #[instrument(skip(self), fields(path = %path.display(), ordering = self.ordering.name()))]
    pub async fn parse(&self, path: &Path) -> Result<ParseResult, IngestionError> {
        let owned = path.to_path_buf();
        let words_per_page = self.words_per_page;
        let ordering = Arc::clone(&self.ordering);

        let task = tokio::task::spawn_blocking(move || {
            parse_epub_file(&owned, words_per_page, ordering.as_ref())
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(IngestionError::task_failed("epub", path, join_err)),
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "EPUB parse timed out");
                Err(IngestionError::ParseTimeout {
                    format: "epub",
                    path: path.display().to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Synchronous parse of an EPUB file on disk
pub fn parse_epub_file(
    path: &Path,
    words_per_page: usize,
    ordering: &dyn ContentOrdering,
) -> Result<ParseResult, IngestionError> {
    let file = std::fs::File::open(path)?;
    parse_epub_reader(
        std::io::BufReader::new(file),
        &path.display().to_string(),
        words_per_page,
        ordering,
    )
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, String> {
    let mut entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse an EPUB from any seekable reader; `label` names it in errors
pub fn parse_epub_reader<R: Read + Seek>(
    reader: R,
    label: &str,
    words_per_page: usize,
    ordering: &dyn ContentOrdering,
) -> Result<ParseResult, IngestionError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| IngestionError::MalformedArchive {
        path: label.to_string(),
        message: e.to_string(),
    })?;

    let malformed = |message: String| IngestionError::MalformedContainer {
        path: label.to_string(),
        message,
    };

    let container = read_entry(&mut archive, CONTAINER_PATH)
        .map_err(|e| malformed(format!("{}: {}", CONTAINER_PATH, e)))?;
    let opf_path = opf::rootfile_path(&container).map_err(&malformed)?;
    let opf_xml = read_entry(&mut archive, &opf_path)
        .map_err(|e| malformed(format!("package document {}: {}", opf_path, e)))?;
    let package = OpfPackage::parse(&opf_path, &opf_xml)
        .map_err(|e| malformed(format!("package document {}: {}", opf_path, e)))?;

    let metadata = package.parsed_metadata();

    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();
    let ordered = ordering.order(&entries, &package);
    debug!(
        content_files = ordered.len(),
        ordering = ordering.name(),
        "Content documents selected"
    );

    let mut paginator = Paginator::new(words_per_page);
    let mut word_count = 0usize;

    for (index, name) in ordered.iter().enumerate() {
        let html = match read_entry(&mut archive, name) {
            Ok(html) => html,
            Err(e) => {
                warn!(entry = %name, error = %e, "Unreadable content document, skipped");
                continue;
            }
        };

        let Some(chapter) = content::extract_chapter(name, &html, index + 1) else {
            continue;
        };

        word_count += chapter.content.split_whitespace().count();
        let added = paginator.push_chapter(chapter.number, &chapter.title, &chapter.content);
        debug!(
            entry = %name,
            chapter = chapter.number,
            title = %chapter.title,
            pages = added,
            "Chapter paginated"
        );
    }

    if paginator.is_empty() {
        let reason = if ordered.is_empty() {
            "no content files found"
        } else {
            "content files found but nothing extracted"
        };
        return Err(IngestionError::EmptyContent {
            path: label.to_string(),
            reason: reason.to_string(),
        });
    }

    let cover_image = match cover::extract_cover(&mut archive, &package) {
        Ok(cover) => cover,
        Err(e) => {
            warn!(error = %e, "Cover extraction failed, continuing without cover");
            None
        }
    };

    let pages = paginator.into_pages();
    let total_pages = pages.len() as u32;

    info!(
        title = %metadata.title,
        total_pages,
        word_count,
        has_cover = cover_image.is_some(),
        "EPUB extracted"
    );

    Ok(ParseResult {
        format: SourceFormat::Epub,
        metadata,
        pages,
        total_pages,
        cover_image,
        diagnostics: ParseDiagnostics {
            content_files: ordered.len(),
            word_count,
            page_count_source: None,
        },
    })
}
