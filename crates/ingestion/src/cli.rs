use clap::Parser;
use std::path::PathBuf;
use uuid::Uuid;

/// Ingest EPUB and PDF files into paginated documents
#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about)]
pub struct Cli {
    /// Files to ingest
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Configuration file; defaults to the config/ directory and APP__ variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Parse and paginate without touching the database
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Print one JSON summary per file instead of a text line
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Uploader recorded on the created documents
    #[arg(long)]
    pub uploader: Option<Uuid>,

    /// Force the format (`epub` or `pdf`) instead of using the extension
    #[arg(long)]
    pub format: Option<String>,

    /// Category recorded on the created documents
    #[arg(long)]
    pub category: Option<String>,
}
