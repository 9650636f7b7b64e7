//! Vector store contract
//!
//! Chunks are embedded and stored under `"{document_id}_{index}"`. Queries
//! return chunks ranked by cosine similarity (`1 - cosine_distance`),
//! highest first. Writers are expected to delete a document's chunks before
//! adding them again; `add` does not deduplicate.

mod memory;
mod pgvector;

pub use memory::MemoryVectorStore;
pub use pgvector::PgVectorStore;

use crate::config::{AppConfig, VectorBackend};
use crate::db::DbPool;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Metadata stored alongside every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    /// Characters in the chunk
    pub chunk_length: usize,
    pub created_at: DateTime<Utc>,
}

/// One query hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub unique_documents: usize,
}

/// Storage key of one chunk
pub fn chunk_id(document_id: Uuid, index: usize) -> String {
    format!("{}_{}", document_id, index)
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and store `chunks` in order; returns how many were stored
    async fn add(&self, document_id: Uuid, filename: &str, chunks: &[String]) -> Result<usize>;

    /// Top `k` chunks by descending similarity
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove every chunk of a document; returns how many were removed
    async fn delete(&self, document_id: Uuid) -> Result<usize>;

    async fn count(&self, document_id: Uuid) -> Result<usize>;

    /// Drop and recreate the whole index
    async fn reset(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Build the configured vector store backend
pub async fn create_vector_store(
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
    db: Option<DbPool>,
) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Memory => Ok(Arc::new(MemoryVectorStore::new(embedder))),
        VectorBackend::Pgvector => {
            let pool = db.ok_or_else(|| AppError::Configuration {
                message: "the pgvector backend requires a database connection".to_string(),
            })?;
            let store = PgVectorStore::new(pool, embedder, &config.vector_store.table)?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

fn check_embedding_count(expected: usize, received: usize) -> Result<()> {
    if expected == received {
        Ok(())
    } else {
        Err(AppError::VectorStore {
            message: format!("embedder returned {} vectors for {} chunks", received, expected),
        })
    }
}
