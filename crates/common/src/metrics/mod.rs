//! Metrics and observability utilities
//!
//! Prometheus metric descriptions and recording helpers with standardized
//! naming. Recording is a no-op until an exporter installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Ragnarok metrics
pub const METRICS_PREFIX: &str = "ragnarok";

/// Buckets for whole-document ingestion latency (in seconds)
pub const INGESTION_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Buckets for embedding and retrieval latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Documents that reached a terminal state"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the vector store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end document ingestion latency in seconds"
    );

    describe_histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Text extraction latency in seconds"
    );

    describe_counter!(
        format!("{}_ocr_pages_total", METRICS_PREFIX),
        Unit::Count,
        "Pages passed through optical character recognition"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total context retrieval queries"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Context retrieval latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieval_context_chars", METRICS_PREFIX),
        Unit::Count,
        "Characters of assembled context"
    );

    // Queue metrics
    describe_gauge!(
        format!("{}_ingestion_queue_depth", METRICS_PREFIX),
        Unit::Count,
        "Documents waiting for an ingestion worker"
    );

    tracing::info!("Metrics registered");
}

/// Record a document reaching a terminal state
pub fn record_ingestion(duration_secs: f64, chunks_created: usize, status: &str, method: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);

    histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .record(duration_secs);
}

pub fn record_extraction(duration_secs: f64, method: &str) {
    histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        "method" => method.to_string()
    )
    .record(duration_secs);
}

/// One recognized (or failed) page
pub fn record_ocr_page(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(
        format!("{}_ocr_pages_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }

    tracing::trace!(model, batch_size, success, duration_secs, "embedding request");
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, found: bool, context_chars: usize) {
    counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        "found" => found.to_string()
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_retrieval_context_chars", METRICS_PREFIX)).record(context_chars as f64);
}

pub fn set_queue_depth(depth: usize) {
    gauge!(format!("{}_ingestion_queue_depth", METRICS_PREFIX)).set(depth as f64);
}
