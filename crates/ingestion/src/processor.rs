//! Ingestion processor
//!
//! Drives one file through parse (with retries), cover storage and
//! persistence. Nothing is written to the store unless the parse succeeded.

use crate::dispatcher::{resolve_format, Dispatcher};
use crate::errors::IngestionError;
use crate::model::{PageCountSource, ParseResult, SourceFormat};
use crate::retry::RetryPolicy;
use crate::storage::CoverWriter;
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use mindpub_common::config::AppConfig;
use mindpub_common::db::models::{NewDocument, NewPage};
use mindpub_common::metrics::{record_ingestion, record_parse_attempt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A file to ingest
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub path: PathBuf,
    /// Format tag or original file name; the path is used when absent
    pub declared_type: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub category: Option<String>,
}

impl IngestRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    fn declared(&self) -> String {
        self.declared_type
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Summary of a completed ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub document_id: Uuid,
    pub format: SourceFormat,
    pub title: String,
    pub author: String,
    pub total_pages: u32,
    pub cover_path: Option<PathBuf>,
    pub attempts: u32,
    pub word_count: usize,
    pub page_count_source: Option<PageCountSource>,
    pub duration_ms: u64,
    pub ingested_at: DateTime<Utc>,
}

/// Ingestion processor
pub struct IngestionProcessor {
    dispatcher: Dispatcher,
    retry: RetryPolicy,
    covers: CoverWriter,
    store: Arc<dyn DocumentStore>,
}

impl IngestionProcessor {
    pub fn new(config: &AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            dispatcher: Dispatcher::new(&config.ingestion),
            retry: RetryPolicy::from_config(&config.ingestion),
            covers: CoverWriter::new(config.storage.cover_dir.clone()),
            store,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Parse under the retry policy. A result without pages counts as
    /// `EmptyContent` so it is retried like any other transient failure.
    async fn parse_with_retry(
        &self,
        path: &Path,
        declared: &str,
    ) -> Result<(ParseResult, u32), IngestionError> {
        let format_label = resolve_format(declared)
            .map(|f| f.as_str())
            .unwrap_or("unknown");

        self.retry
            .run(|attempt| async move {
                debug!(attempt, "Parse attempt");
                let outcome = self
                    .dispatcher
                    .parse_file(path, declared)
                    .await
                    .and_then(|parsed| require_pages(parsed, path))
                    .map(|parsed| (parsed, attempt));

                record_parse_attempt(format_label, outcome.as_ref().err().map(|e| e.kind()));
                outcome
            })
            .await
    }

    /// Parse a file and persist it as a new document
    #[instrument(skip(self, request), fields(path = %request.path.display()))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, IngestionError> {
        let started = Instant::now();
        let declared = request.declared();

        info!("Ingesting document");
        let (parsed, attempts) = self.parse_with_retry(&request.path, &declared).await?;
        ensure_dense(&parsed, &request.path)?;

        let cover_path = match &parsed.cover_image {
            Some(cover) => match self.covers.save(cover).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Failed to save cover, continuing without it");
                    None
                }
            },
            None => None,
        };

        let document = new_document(&request, &parsed, cover_path.as_deref());
        let pages = new_pages(&parsed);
        let document_id = self.store.create_document(document, &pages).await?;

        let elapsed = started.elapsed();
        record_ingestion(elapsed.as_secs_f64(), pages.len(), parsed.format.as_str());

        info!(
            document_id = %document_id,
            format = %parsed.format,
            total_pages = parsed.total_pages,
            attempts,
            duration_ms = elapsed.as_millis() as u64,
            "Document ingested"
        );

        Ok(outcome(document_id, &parsed, cover_path, attempts, elapsed.as_millis() as u64))
    }

    /// Re-parse a file and overwrite the pages of an existing document
    #[instrument(skip(self, request), fields(document_id = %document_id, path = %request.path.display()))]
    pub async fn reingest(
        &self,
        document_id: Uuid,
        request: IngestRequest,
    ) -> Result<IngestOutcome, IngestionError> {
        let started = Instant::now();
        let declared = request.declared();

        let (parsed, attempts) = self.parse_with_retry(&request.path, &declared).await?;
        ensure_dense(&parsed, &request.path)?;

        let pages = new_pages(&parsed);
        self.store.replace_pages(document_id, &pages).await?;

        let elapsed = started.elapsed();
        info!(total_pages = parsed.total_pages, attempts, "Document pages replaced");

        Ok(outcome(document_id, &parsed, None, attempts, elapsed.as_millis() as u64))
    }
}

/// Zero pages is an `EmptyContent` failure, never a successful parse
fn require_pages(parsed: ParseResult, path: &Path) -> Result<ParseResult, IngestionError> {
    if parsed.pages.is_empty() || parsed.total_pages == 0 {
        return Err(IngestionError::EmptyContent {
            path: path.display().to_string(),
            reason: "parser returned zero pages".to_string(),
        });
    }
    Ok(parsed)
}

fn ensure_dense(parsed: &ParseResult, path: &Path) -> Result<(), IngestionError> {
    if parsed.is_dense() {
        return Ok(());
    }
    Err(IngestionError::Storage(format!(
        "refusing to persist {}: page numbers are not exactly 1..={}",
        path.display(),
        parsed.total_pages
    )))
}

fn new_document(request: &IngestRequest, parsed: &ParseResult, cover_path: Option<&Path>) -> NewDocument {
    let meta = &parsed.metadata;
    NewDocument {
        title: meta.title.clone(),
        author: meta.author.clone(),
        description: meta.description.clone(),
        category: request.category.clone(),
        page_count: parsed.total_pages as i32,
        cover_path: cover_path.map(|p| p.display().to_string()),
        source_path: request.path.display().to_string(),
        source_format: parsed.format.as_str().to_string(),
        release_date: meta.published_date.clone(),
        publisher: meta.publisher.clone(),
        subject: meta.subject.clone(),
        tags: meta.tags.clone(),
        rights: meta.rights.clone(),
        language: meta.language.clone(),
        identifier: meta.identifier.clone(),
        uploaded_by: request.uploaded_by,
    }
}

fn new_pages(parsed: &ParseResult) -> Vec<NewPage> {
    parsed
        .pages
        .iter()
        .map(|p| NewPage {
            page_number: p.page_number as i32,
            content: p.content.clone(),
            chapter_number: p.chapter_number.map(|n| n as i32),
            chapter_title: p.chapter_title.clone(),
        })
        .collect()
}

fn outcome(
    document_id: Uuid,
    parsed: &ParseResult,
    cover_path: Option<PathBuf>,
    attempts: u32,
    duration_ms: u64,
) -> IngestOutcome {
    IngestOutcome {
        document_id,
        format: parsed.format,
        title: parsed.metadata.title.clone(),
        author: parsed.metadata.author.clone(),
        total_pages: parsed.total_pages,
        cover_path,
        attempts,
        word_count: parsed.diagnostics.word_count,
        page_count_source: parsed.diagnostics.page_count_source,
        duration_ms,
        ingested_at: Utc::now(),
    }
}
