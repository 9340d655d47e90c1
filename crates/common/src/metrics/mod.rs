//! Metrics and observability utilities
//!
//! Prometheus-style metric names for the ingestion pipeline.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all MindPub metrics
pub const METRICS_PREFIX: &str = "mindpub";

/// Buckets for ingestion latency (parsing whole books is slow)
pub const INGESTION_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s - parse timeout
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_pages_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages persisted"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    describe_counter!(
        format!("{}_parse_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Parse attempts, including retries"
    );

    describe_counter!(
        format!("{}_parse_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed parse attempts by error kind"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a completed ingestion
pub fn record_ingestion(duration_secs: f64, pages_created: usize, format: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_pages_created_total", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .increment(pages_created as u64);

    histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a single parse attempt
pub fn record_parse_attempt(format: &str, failure_kind: Option<&str>) {
    counter!(
        format!("{}_parse_attempts_total", METRICS_PREFIX),
        "format" => format.to_string()
    )
    .increment(1);

    if let Some(kind) = failure_kind {
        counter!(
            format!("{}_parse_failures_total", METRICS_PREFIX),
            "format" => format.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}
