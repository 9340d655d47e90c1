//! MindPub Ingestion Library
//!
//! Turns uploaded EPUB and PDF files into numbered pages:
//! - Format dispatch by tag or extension
//! - EPUB container, metadata, chapter and cover extraction
//! - PDF text extraction with a page-count fallback cascade
//! - Deterministic word-based pagination
//! - Retry, cover storage and persistence through [`store::DocumentStore`]

pub mod dispatcher;
pub mod epub;
pub mod errors;
pub mod model;
pub mod paginate;
pub mod pdf;
pub mod processor;
pub mod retry;
pub mod storage;
pub mod store;

pub use dispatcher::{get_file_type, Dispatcher};
pub use errors::IngestionError;
pub use model::{Page, ParseResult, ParsedMetadata, SourceFormat};
pub use processor::{IngestOutcome, IngestRequest, IngestionProcessor};
pub use retry::RetryPolicy;
pub use store::{DatabaseStore, DocumentStore, MemoryStore};
