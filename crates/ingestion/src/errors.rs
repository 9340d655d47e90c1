//! Ingestion error types

use thiserror::Error;

/// Error kinds the retry policy retries unless configured otherwise
pub const RETRYABLE_KINDS: &[&str] = &[
    "parse_timeout",
    "empty_content",
    "undetermined_page_count",
    "pdf_parse",
    "io",
];

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed EPUB container in {path}: {message}")]
    MalformedContainer { path: String, message: String },

    #[error("Malformed archive {path}: {message}")]
    MalformedArchive { path: String, message: String },

    #[error("{format} parse of {path} exceeded {secs}s")]
    ParseTimeout {
        format: &'static str,
        path: String,
        secs: u64,
    },

    #[error("No pages extracted from {path}: {reason}")]
    EmptyContent { path: String, reason: String },

    #[error("Could not determine page count of {path}")]
    UndeterminedPageCount { path: String },

    #[error("Cover extraction failed: {0}")]
    CoverExtractionFailed(String),

    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    /// The extractor's blocking task panicked or was cancelled. The same
    /// bytes would fail the same way, so this is never retried.
    #[error("{format} extraction of {path} aborted: {message}")]
    ExtractionPanicked {
        format: &'static str,
        path: String,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    /// Stable snake_case name of the variant, used for metrics labels and retry lists
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::UnsupportedFormat(_) => "unsupported_format",
            IngestionError::MalformedContainer { .. } => "malformed_container",
            IngestionError::MalformedArchive { .. } => "malformed_archive",
            IngestionError::ParseTimeout { .. } => "parse_timeout",
            IngestionError::EmptyContent { .. } => "empty_content",
            IngestionError::UndeterminedPageCount { .. } => "undetermined_page_count",
            IngestionError::CoverExtractionFailed(_) => "cover_extraction_failed",
            IngestionError::PdfParse { .. } => "pdf_parse",
            IngestionError::ExtractionPanicked { .. } => "extraction_panicked",
            IngestionError::Storage(_) => "storage",
            IngestionError::Config(_) => "config",
            IngestionError::Io(_) => "io",
        }
    }

    pub(crate) fn task_failed(
        format: &'static str,
        path: &std::path::Path,
        err: tokio::task::JoinError,
    ) -> Self {
        IngestionError::ExtractionPanicked {
            format,
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Whether another parse attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_KINDS.contains(&self.kind())
    }
}

impl From<mindpub_common::errors::AppError> for IngestionError {
    fn from(e: mindpub_common::errors::AppError) -> Self {
        match e {
            mindpub_common::errors::AppError::Configuration { message } => {
                IngestionError::Config(message)
            }
            other => IngestionError::Storage(format!("{} (code {})", other, other.code().as_code())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        let timeout = IngestionError::ParseTimeout {
            format: "pdf",
            path: "a.pdf".into(),
            secs: 30,
        };
        assert!(timeout.is_retryable());
        assert!(IngestionError::UndeterminedPageCount { path: "a.pdf".into() }.is_retryable());
        assert!(!IngestionError::UnsupportedFormat("docx".into()).is_retryable());
        assert!(!IngestionError::MalformedContainer {
            path: "a.epub".into(),
            message: "no rootfile".into(),
        }
        .is_retryable());
        assert!(!IngestionError::Storage("duplicate key".into()).is_retryable());
    }

    #[test]
    fn test_app_error_conversion() {
        let err: IngestionError = mindpub_common::AppError::Configuration {
            message: "bad url".into(),
        }
        .into();
        assert_eq!(err.kind(), "config");

        let err: IngestionError = mindpub_common::AppError::DocumentNotFound {
            id: "x".into(),
        }
        .into();
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("code 4002"));
    }
}
