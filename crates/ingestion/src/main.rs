//! Ragnarok Ingestion Service
//!
//! Ingests every PDF named on the command line (files or directories,
//! default: the configured upload folder):
//! 1. Creates a pending document record per file
//! 2. Queues it on the worker pool
//! 3. Waits for the pool to drain and reports the outcome

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use ragnarok_common::config::{AppConfig, ObservabilityConfig, VectorBackend};
use ragnarok_common::db::{DbPool, DocumentStore, MemoryDocumentStore, Repository};
use ragnarok_common::document::ProcessingStatus;
use ragnarok_common::embeddings::create_embedder;
use ragnarok_common::errors::AppError;
use ragnarok_common::metrics::{register_metrics, EMBEDDING_BUCKETS, INGESTION_BUCKETS};
use ragnarok_common::vector_store::create_vector_store;
use ragnarok_common::VERSION;
use ragnarok_ingestion::{IngestionPipeline, WorkerPool};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting Ragnarok Ingestion Service v{}",
        VERSION
    );

    if config.observability.metrics_port != 0 {
        init_metrics(config.observability.metrics_port)?;
    }

    let embedder = create_embedder(&config.embedding)?;
    info!(model = embedder.model_name(), dimension = embedder.dimension(), "Embedder ready");

    let (documents, db): (Arc<dyn DocumentStore>, Option<DbPool>) = match config.vector_store.backend {
        VectorBackend::Memory => (Arc::new(MemoryDocumentStore::new()), None),
        VectorBackend::Pgvector => {
            let pool = DbPool::new(&config.database).await?;
            pool.ping().await?;
            info!("Database connection verified");
            let repository = Repository::new(pool.clone());
            repository.ensure_schema().await?;
            (Arc::new(repository), Some(pool))
        }
    };

    let vector_store = create_vector_store(&config, embedder, db).await?;
    let pipeline = Arc::new(IngestionPipeline::from_config(
        &config,
        Arc::clone(&documents),
        Arc::clone(&vector_store),
    ));
    let pool = WorkerPool::new(pipeline, &config.worker);

    let mut inputs: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        inputs.push(PathBuf::from(&config.storage.upload_folder));
    }
    let files = collect_pdfs(&inputs)?;
    info!(files = files.len(), "Queueing documents");

    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed.pdf".to_string());
        let document = documents.create(&filename, &path.display().to_string()).await?;

        // Back off while the workers catch up
        loop {
            match pool.ingest(document.id, &path, filename.as_str()) {
                Err(AppError::QueueFull { .. }) => tokio::time::sleep(Duration::from_millis(200)).await,
                other => break other?,
            }
        }
        ids.push(document.id);
    }

    tokio::select! {
        _ = pool.shutdown() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, documents still in flight stay in processing");
        }
    }

    let (mut completed, mut failed) = (0usize, 0usize);
    for id in &ids {
        match documents.get(*id).await? {
            Some(doc) if doc.processing_status == ProcessingStatus::Completed => completed += 1,
            Some(doc) => {
                if doc.processing_status == ProcessingStatus::Failed {
                    failed += 1;
                }
                if let Some(reason) = &doc.processing_error {
                    error!(filename = %doc.filename, error = %reason, "Document failed");
                }
            }
            None => {}
        }
    }

    let stats = vector_store.stats().await?;
    info!(
        total = ids.len(),
        completed,
        failed,
        indexed_chunks = stats.total_chunks,
        indexed_documents = stats.unique_documents,
        "Ingestion run complete"
    );

    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("ingestion_duration_seconds".to_string()), INGESTION_BUCKETS)?
        .set_buckets_for_metric(Matcher::Suffix("embedding_duration_seconds".to_string()), EMBEDDING_BUCKETS)?
        .set_buckets_for_metric(Matcher::Suffix("retrieval_duration_seconds".to_string()), EMBEDDING_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    register_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// PDFs named directly, plus PDFs found directly inside named directories
fn collect_pdfs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Cannot read directory {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_pdf(path))
                .collect();
            found.sort();
            files.extend(found);
        } else if is_pdf(input) {
            files.push(input.clone());
        } else {
            warn!(path = %input.display(), "Skipping non-PDF input");
        }
    }

    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
