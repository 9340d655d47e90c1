//! MindPub Ingestion CLI
//!
//! Ingests each file given on the command line:
//! 1. Parses it (EPUB or PDF) under the retry policy
//! 2. Stores the cover image, if any
//! 3. Persists the document and its pages
//! 4. Prints a summary line

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use mindpub_common::config::{AppConfig, ObservabilityConfig};
use mindpub_common::db::{DbPool, Repository};
use mindpub_common::metrics::{register_metrics, INGESTION_BUCKETS, METRICS_PREFIX};
use mindpub_common::VERSION;
use mindpub_ingestion::{
    DatabaseStore, DocumentStore, IngestOutcome, IngestRequest, IngestionProcessor, MemoryStore,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries the per-file summaries
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)),
            INGESTION_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Metrics exporter listening");
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    };
    config.context("Failed to load configuration")
}

fn print_summary(path: &Path, outcome: &IngestOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        println!(
            "{}\t{}\t{}\t{} pages\t{}",
            path.display(),
            outcome.document_id,
            outcome.format,
            outcome.total_pages,
            outcome.title
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting MindPub ingestion v{}",
        VERSION
    );

    register_metrics();
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }

    let store: Arc<dyn DocumentStore> = if cli.dry_run {
        info!("Dry run, documents are kept in memory");
        Arc::new(MemoryStore::new())
    } else {
        let pool = DbPool::new(&config.database).await?;
        pool.ping().await?;
        Arc::new(DatabaseStore::new(Repository::new(pool), &config.ingestion))
    };

    let processor = IngestionProcessor::new(&config, store);

    let mut failures = 0usize;
    for file in &cli.files {
        let request = IngestRequest {
            path: file.clone(),
            declared_type: cli.format.clone(),
            uploaded_by: cli.uploader,
            category: cli.category.clone(),
        };

        match processor.ingest(request).await {
            Ok(outcome) => print_summary(file, &outcome, cli.json)?,
            Err(e) => {
                error!(path = %file.display(), kind = e.kind(), error = %e, "Ingestion failed");
                failures += 1;
            }
        }
    }

    info!(
        files = cli.files.len(),
        failures,
        "Ingestion run complete"
    );

    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, cli.files.len());
    }
    Ok(())
}
