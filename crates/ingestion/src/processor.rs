//! Ingestion pipeline
//!
//! Drives one document `pending -> processing -> {completed | failed}`:
//! extraction, chunking, then replacing the document's chunks in the vector
//! store. Every failure inside the run, panics included, ends in `failed`.

use crate::analysis::analyze;
use crate::chunker::chunk_text;
use crate::errors::IngestionError;
use crate::extract::ExtractionSelector;
use chrono::Utc;
use futures::FutureExt;
use ragnarok_common::config::{AppConfig, ChunkingConfig};
use ragnarok_common::db::DocumentStore;
use ragnarok_common::document::{CompletionReport, Document, ExtractionMethod, FailureReport};
use ragnarok_common::errors::AppError;
use ragnarok_common::metrics;
use ragnarok_common::vector_store::VectorStore;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// What is known about a run when it stops
#[derive(Debug, Default)]
struct RunProgress {
    method: Option<ExtractionMethod>,
    text_length: Option<usize>,
}

pub struct IngestionPipeline {
    documents: Arc<dyn DocumentStore>,
    vector_store: Arc<dyn VectorStore>,
    selector: ExtractionSelector,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        vector_store: Arc<dyn VectorStore>,
        selector: ExtractionSelector,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            documents,
            vector_store,
            selector,
            chunking,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        documents: Arc<dyn DocumentStore>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self::new(
            documents,
            vector_store,
            ExtractionSelector::from_config(&config.extraction),
            config.chunking.clone(),
        )
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Process a pending document to a terminal state.
    ///
    /// Errors are returned only when the document record itself cannot be
    /// read, moved to `processing` or saved; pipeline failures are recorded
    /// on the document instead.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn process(&self, document_id: Uuid, path: &Path) -> Result<Document, IngestionError> {
        let mut document = self
            .documents
            .get(document_id)
            .await?
            .ok_or(AppError::DocumentNotFound { id: document_id })?;

        let metadata = tokio::fs::metadata(path).await;
        let file_size = metadata.as_ref().ok().map(|m| m.len());
        let page_count = match metadata {
            Ok(_) => self.selector.page_count(path).await,
            Err(_) => None,
        };

        document.begin_processing(Utc::now(), file_size, page_count)?;
        self.documents.update(&document).await?;
        info!(
            filename = %document.filename,
            file_size = ?file_size,
            page_count = ?page_count,
            "Processing document"
        );

        let mut progress = RunProgress::default();
        let run = AssertUnwindSafe(self.run(&document, path, metadata.err(), &mut progress))
            .catch_unwind()
            .await;
        let outcome = match run {
            Ok(outcome) => outcome,
            Err(panic) => Err(IngestionError::Panicked(panic_message(panic))),
        };

        let now = Utc::now();
        match outcome {
            Ok(report) => {
                document.complete(report, now)?;
                info!(
                    method = ?document.extraction_method,
                    chunk_count = document.chunk_count,
                    duration = ?document.processing_duration,
                    "Document ingested"
                );
            }
            Err(e) => {
                match &e {
                    IngestionError::Panicked(_) | IngestionError::Internal(_) => {
                        error!(error = %e, "Ingestion aborted")
                    }
                    _ => warn!(error = %e, "Ingestion failed"),
                }
                document.fail(
                    FailureReport {
                        message: e.failure_message(),
                        method: e.method().or(progress.method),
                        text_length: progress.text_length,
                    },
                    now,
                )?;
            }
        }

        if let Err(e) = self.documents.update(&document).await {
            error!(
                document_id = %document.id,
                status = %document.processing_status,
                chunk_count = document.chunk_count,
                error = %e,
                "Failed to save ingestion outcome, record left in processing"
            );
            return Err(e.into());
        }

        metrics::record_ingestion(
            document.processing_duration.unwrap_or_default(),
            document.chunk_count,
            document.processing_status.as_str(),
            document.extraction_method.map(|m| m.as_str()).unwrap_or("none"),
        );

        Ok(document)
    }

    async fn run(
        &self,
        document: &Document,
        path: &Path,
        unreadable: Option<std::io::Error>,
        progress: &mut RunProgress,
    ) -> Result<CompletionReport, IngestionError> {
        // Chunks from an earlier run go first, so a failed rerun leaves none behind
        let removed = self
            .vector_store
            .delete(document.id)
            .await
            .map_err(|e| IngestionError::StorageFailure(e.to_string()))?;
        if removed > 0 {
            debug!(removed, "Removed chunks from a previous run");
        }

        if let Some(source) = unreadable {
            return Err(IngestionError::TransientIo {
                path: path.display().to_string(),
                source,
            });
        }

        let (text, method) = self.selector.extract(path).await.into_parts();
        let text_length = text.chars().count();
        progress.method = Some(method);
        progress.text_length = Some(text_length);

        if text.trim().is_empty() {
            return Err(IngestionError::ExtractionFailure { method });
        }

        let chunks = chunk_text(&text, &self.chunking);
        if chunks.is_empty() {
            return Err(IngestionError::ChunkingFailure);
        }
        debug!(chunks = chunks.len(), text_length, "Text chunked");

        let stored = self
            .vector_store
            .add(document.id, &document.filename, &chunks)
            .await
            .map_err(|e| IngestionError::StorageFailure(e.to_string()))?;

        let analysis = analyze(&text);
        Ok(CompletionReport {
            method,
            chunk_count: stored,
            text_length,
            content_preview: analysis.content_preview,
            key_topics: analysis.key_topics,
        })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
