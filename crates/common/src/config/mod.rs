//! Configuration management for MindPub services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Postgres caps bind parameters per statement at 65535.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// File storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// How EPUB content documents are put into reading order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrderingKind {
    /// Every HTML file in the archive, sorted by name
    Filename,
    /// The OPF spine
    Spine,
    /// Spine first, filename scan if the spine yields nothing
    SpineThenFilename,
}

/// Delay growth between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Words per EPUB page
    #[serde(default = "default_words_per_page")]
    pub words_per_page: usize,

    /// Budget for the primary PDF parse, in seconds
    #[serde(default = "default_parse_timeout")]
    pub pdf_timeout_secs: u64,

    /// Budget for loading and extracting an EPUB archive, in seconds
    #[serde(default = "default_parse_timeout")]
    pub epub_timeout_secs: u64,

    /// Characters per page used to estimate PDF page counts from text
    #[serde(default = "default_chars_per_page")]
    pub chars_per_page_estimate: usize,

    /// Total parse attempts per ingestion
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Fixed or exponential growth of the retry delay
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: BackoffKind,

    /// Page rows per upsert statement
    #[serde(default = "default_page_batch_size")]
    pub page_batch_size: usize,

    /// EPUB content ordering strategy
    #[serde(default = "default_content_ordering")]
    pub content_ordering: ContentOrderingKind,

    /// Render page 1 of PDFs as a cover when a renderer is available
    #[serde(default = "default_render_pdf_covers")]
    pub render_pdf_covers: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory where extracted cover images are written
    #[serde(default = "default_cover_dir")]
    pub cover_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_database_url() -> String { "postgres://localhost/mindpub".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_words_per_page() -> usize { 300 }
fn default_parse_timeout() -> u64 { 30 }
fn default_chars_per_page() -> usize { 2000 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 1000 }
fn default_retry_backoff() -> BackoffKind { BackoffKind::Fixed }
fn default_page_batch_size() -> usize { 1000 }
fn default_content_ordering() -> ContentOrderingKind { ContentOrderingKind::Filename }
fn default_render_pdf_covers() -> bool { true }
fn default_cover_dir() -> PathBuf { PathBuf::from("uploads/covers") }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "mindpub-ingestion".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            words_per_page: default_words_per_page(),
            pdf_timeout_secs: default_parse_timeout(),
            epub_timeout_secs: default_parse_timeout(),
            chars_per_page_estimate: default_chars_per_page(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            retry_backoff: default_retry_backoff(),
            page_batch_size: default_page_batch_size(),
            content_ordering: default_content_ordering(),
            render_pdf_covers: default_render_pdf_covers(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cover_dir: default_cover_dir(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__INGESTION__WORDS_PER_PAGE=250
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl IngestionConfig {
    /// Get the PDF parse budget as Duration
    pub fn pdf_timeout(&self) -> Duration {
        Duration::from_secs(self.pdf_timeout_secs)
    }

    /// Get the EPUB load budget as Duration
    pub fn epub_timeout(&self) -> Duration {
        Duration::from_secs(self.epub_timeout_secs)
    }

    /// Get the first retry delay as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Rows per upsert, clamped so a statement stays under the bind-parameter ceiling
    pub fn effective_batch_size(&self, params_per_row: usize) -> usize {
        let ceiling = MAX_BIND_PARAMS / params_per_row.max(1);
        self.page_batch_size.clamp(1, ceiling)
    }
}
