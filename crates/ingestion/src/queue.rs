//! Background ingestion worker pool
//!
//! A bounded queue of jobs drained by a fixed number of worker tasks.
//! Submitting never blocks: callers get `QueueFull` back and decide
//! themselves whether to retry. Progress is observed by polling the
//! document record.

use crate::processor::IngestionPipeline;
use ragnarok_common::config::WorkerConfig;
use ragnarok_common::db::DocumentStore;
use ragnarok_common::errors::{AppError, Result};
use ragnarok_common::metrics;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One document waiting to be ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub document_id: Uuid,
    pub path: PathBuf,
    pub filename: String,
}

pub struct WorkerPool {
    sender: mpsc::Sender<IngestionJob>,
    workers: Vec<JoinHandle<()>>,
    documents: Arc<dyn DocumentStore>,
}

impl WorkerPool {
    /// Spawn the workers; must be called inside a tokio runtime
    pub fn new(pipeline: Arc<IngestionPipeline>, config: &WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let documents = Arc::clone(pipeline.documents());

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let pipeline = Arc::clone(&pipeline);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(run_worker(worker, pipeline, receiver))
            })
            .collect();

        info!(
            workers = config.workers.max(1),
            capacity = config.queue_capacity.max(1),
            "Ingestion worker pool started"
        );

        Self {
            sender,
            workers,
            documents,
        }
    }

    /// Queue a job without waiting for room
    pub fn submit(&self, job: IngestionJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::QueueFull {
                capacity: self.sender.max_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => AppError::QueueClosed,
        })?;
        metrics::set_queue_depth(self.depth());
        Ok(())
    }

    /// Fire-and-forget ingestion of a `pending` document
    pub fn ingest(&self, document_id: Uuid, path: impl Into<PathBuf>, filename: impl Into<String>) -> Result<()> {
        self.submit(IngestionJob {
            document_id,
            path: path.into(),
            filename: filename.into(),
        })
    }

    /// Reset terminal documents to `pending` and queue them again.
    ///
    /// Unknown or still-running documents are skipped. Returns how many were
    /// queued; stops with `QueueFull` once the queue has no room, leaving the
    /// remaining documents untouched.
    pub async fn reprocess(&self, document_ids: &[Uuid]) -> Result<usize> {
        let mut queued = 0;

        for &id in document_ids {
            let Some(mut document) = self.documents.get(id).await? else {
                warn!(document_id = %id, "Cannot reprocess unknown document");
                continue;
            };
            if !document.is_terminal() {
                warn!(
                    document_id = %id,
                    status = %document.processing_status,
                    "Document is not in a terminal state, skipping"
                );
                continue;
            }

            let permit = self.sender.try_reserve().map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => AppError::QueueFull {
                    capacity: self.sender.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => AppError::QueueClosed,
            })?;

            document.reset_for_reprocessing()?;
            self.documents.update(&document).await?;
            permit.send(IngestionJob {
                document_id: id,
                path: PathBuf::from(&document.filepath),
                filename: document.filename.clone(),
            });
            queued += 1;
        }

        metrics::set_queue_depth(self.depth());
        info!(requested = document_ids.len(), queued, "Documents queued for reprocessing");
        Ok(queued)
    }

    /// Jobs waiting for a worker
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Close the queue and wait for queued and in-flight jobs to finish
    pub async fn shutdown(self) {
        let Self { sender, workers, .. } = self;
        drop(sender);

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Ingestion worker terminated abnormally");
            }
        }
        metrics::set_queue_depth(0);
        info!("Ingestion worker pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    pipeline: Arc<IngestionPipeline>,
    receiver: Arc<Mutex<mpsc::Receiver<IngestionJob>>>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            let job = receiver.recv().await;
            metrics::set_queue_depth(receiver.len());
            job
        };
        let Some(job) = job else {
            break;
        };

        match pipeline.process(job.document_id, &job.path).await {
            Ok(document) => info!(
                worker,
                document_id = %document.id,
                filename = %job.filename,
                status = %document.processing_status,
                "Job finished"
            ),
            Err(e) => error!(
                worker,
                document_id = %job.document_id,
                filename = %job.filename,
                error = %e,
                "Job could not be processed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionSelector;
    use crate::test_support::{write_text_pdf, PROSE};
    use async_trait::async_trait;
    use ragnarok_common::config::{ChunkingConfig, ExtractionConfig};
    use ragnarok_common::db::MemoryDocumentStore;
    use ragnarok_common::document::ProcessingStatus;
    use ragnarok_common::embeddings::HashingEmbedder;
    use ragnarok_common::vector_store::{MemoryVectorStore, ScoredChunk, StoreStats, VectorStore};
    use tokio::sync::{Notify, Semaphore};
    use tokio_test::assert_ok;

    /// Holds every `add` until the test hands out permits
    struct GatedStore {
        inner: MemoryVectorStore,
        entered: Notify,
        release: Semaphore,
    }

    #[async_trait]
    impl VectorStore for GatedStore {
        async fn add(&self, id: Uuid, filename: &str, chunks: &[String]) -> Result<usize> {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            self.inner.add(id, filename, chunks).await
        }

        async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
            self.inner.query(text, k).await
        }

        async fn delete(&self, id: Uuid) -> Result<usize> {
            self.inner.delete(id).await
        }

        async fn count(&self, id: Uuid) -> Result<usize> {
            self.inner.count(id).await
        }

        async fn reset(&self) -> Result<()> {
            self.inner.reset().await
        }

        async fn stats(&self) -> Result<StoreStats> {
            self.inner.stats().await
        }
    }

    fn pipeline(store: Arc<dyn VectorStore>) -> (Arc<MemoryDocumentStore>, Arc<IngestionPipeline>) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let selector = ExtractionSelector::from_config(&ExtractionConfig {
            ocr_enabled: false,
            ..Default::default()
        });
        let pipeline = Arc::new(IngestionPipeline::new(
            documents.clone(),
            store,
            selector,
            ChunkingConfig::default(),
        ));
        (documents, pipeline)
    }

    fn memory_store() -> Arc<MemoryVectorStore> {
        Arc::new(MemoryVectorStore::new(Arc::new(HashingEmbedder::new(64))))
    }

    #[tokio::test]
    async fn test_jobs_reach_terminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let (documents, pipeline) = pipeline(memory_store());
        let pool = WorkerPool::new(pipeline, &WorkerConfig { workers: 2, queue_capacity: 8 });

        let mut ids = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("doc{}.pdf", i));
            write_text_pdf(&path, &[PROSE]);
            let doc = documents.create("doc.pdf", &path.display().to_string()).await.unwrap();
            assert_ok!(pool.ingest(doc.id, &path, "doc.pdf"));
            ids.push(doc.id);
        }

        pool.shutdown().await;

        for id in ids {
            let doc = documents.get(id).await.unwrap().unwrap();
            assert_eq!(doc.processing_status, ProcessingStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(GatedStore {
            inner: MemoryVectorStore::new(Arc::new(HashingEmbedder::new(64))),
            entered: Notify::new(),
            release: Semaphore::new(0),
        });
        let (documents, pipeline) = pipeline(gate.clone());
        let pool = WorkerPool::new(pipeline, &WorkerConfig { workers: 1, queue_capacity: 1 });

        let path = dir.path().join("doc.pdf");
        write_text_pdf(&path, &[PROSE]);
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(documents.create("doc.pdf", &path.display().to_string()).await.unwrap().id);
        }

        // First job is picked up and held inside the store
        assert_ok!(pool.ingest(ids[0], &path, "doc.pdf"));
        gate.entered.notified().await;

        // Second waits in the queue, third finds it full
        assert_ok!(pool.ingest(ids[1], &path, "doc.pdf"));
        assert_eq!(pool.depth(), 1);
        let err = pool.ingest(ids[2], &path, "doc.pdf").unwrap_err();
        assert!(matches!(err, AppError::QueueFull { capacity: 1 }));

        gate.release.add_permits(8);
        pool.shutdown().await;

        let statuses: Vec<ProcessingStatus> = {
            let mut out = Vec::new();
            for id in &ids {
                out.push(documents.get(*id).await.unwrap().unwrap().processing_status);
            }
            out
        };
        assert_eq!(
            statuses,
            vec![ProcessingStatus::Completed, ProcessingStatus::Completed, ProcessingStatus::Pending]
        );
    }

    #[tokio::test]
    async fn test_reprocess_failed_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();
        let (documents, pipeline) = pipeline(store.clone());
        let path = dir.path().join("late.pdf");
        std::fs::write(&path, b"not yet a pdf").unwrap();
        let doc = documents.create("late.pdf", &path.display().to_string()).await.unwrap();

        let failed = pipeline.process(doc.id, &path).await.unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);

        // The upload is repaired, then an operator re-drives the document
        write_text_pdf(&path, &[PROSE, PROSE]);
        let pool = WorkerPool::new(pipeline, &WorkerConfig { workers: 1, queue_capacity: 4 });
        let queued = pool.reprocess(&[doc.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(queued, 1);
        pool.shutdown().await;

        let done = documents.get(doc.id).await.unwrap().unwrap();
        assert_eq!(done.processing_status, ProcessingStatus::Completed);
        assert_eq!(done.chunk_count, store.count(doc.id).await.unwrap());
        assert!(done.processing_error.is_none());
    }
}
