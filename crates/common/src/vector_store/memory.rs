//! In-memory vector store.
//!
//! Brute-force cosine similarity over every stored chunk. Suitable for tests,
//! development and single-process deployments with small corpora.

use super::{check_embedding_count, chunk_id, ChunkMetadata, ScoredChunk, StoreStats, VectorStore};
use crate::embeddings::{cosine_similarity, Embedder};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
struct StoredChunk {
    content: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    chunks: Arc<RwLock<HashMap<String, StoredChunk>>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, document_id: Uuid, filename: &str, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        // Embed before taking the lock so readers are not blocked
        let embeddings = self.embedder.embed_batch(chunks).await?;
        check_embedding_count(chunks.len(), embeddings.len())?;

        let created_at = Utc::now();
        let mut store = self.chunks.write().await;
        for (index, (content, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            store.insert(
                chunk_id(document_id, index),
                StoredChunk {
                    content: content.clone(),
                    metadata: ChunkMetadata {
                        document_id,
                        filename: filename.to_string(),
                        chunk_index: index,
                        chunk_length: content.chars().count(),
                        created_at,
                    },
                    embedding,
                },
            );
        }

        debug!(%document_id, chunks = chunks.len(), "Stored chunks");
        Ok(chunks.len())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;
        let store = self.chunks.read().await;

        let mut results: Vec<(&String, f32, &StoredChunk)> = store
            .iter()
            .map(|(id, chunk)| (id, cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();

        // Descending similarity, ties broken by id for a stable order
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        Ok(results
            .into_iter()
            .take(k)
            .map(|(_, similarity, chunk)| ScoredChunk {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                similarity,
            })
            .collect())
    }

    async fn delete(&self, document_id: Uuid) -> Result<usize> {
        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|_, chunk| chunk.metadata.document_id != document_id);
        Ok(before - store.len())
    }

    async fn count(&self, document_id: Uuid) -> Result<usize> {
        let store = self.chunks.read().await;
        Ok(store
            .values()
            .filter(|chunk| chunk.metadata.document_id == document_id)
            .count())
    }

    async fn reset(&self) -> Result<()> {
        self.chunks.write().await.clear();
        debug!("Vector store reset");
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let store = self.chunks.read().await;
        let documents: HashSet<Uuid> = store.values().map(|c| c.metadata.document_id).collect();
        Ok(StoreStats {
            total_chunks: store.len(),
            unique_documents: documents.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(HashingEmbedder::new(384)))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_semantic_ranking_across_documents() {
        let store = store();
        let ml = Uuid::new_v4();
        let pasta = Uuid::new_v4();

        store
            .add(
                ml,
                "ml.pdf",
                &texts(&[
                    "Machine learning models such as neural networks learn from data",
                    "Training neural networks uses backpropagation and gradient descent",
                    "Deep learning stacks many layers of neural networks",
                ]),
            )
            .await
            .unwrap();
        store
            .add(
                pasta,
                "pasta.pdf",
                &texts(&[
                    "Cooking pasta starts with boiling salted water",
                    "Drain the spaghetti and toss it with tomato sauce",
                    "Fresh pasta cooks faster than dried pasta",
                ]),
            )
            .await
            .unwrap();

        let results = store.query("neural networks", 6).await.unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results[0].metadata.document_id, ml);

        let last_ml = results.iter().rposition(|r| r.metadata.document_id == ml).unwrap();
        let first_pasta = results.iter().position(|r| r.metadata.document_id == pasta).unwrap();
        assert!(last_ml < first_pasta);

        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store();
        let doc = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.add(doc, "a.pdf", &texts(&["one", "two", "three"])).await.unwrap();
        store.add(other, "b.pdf", &texts(&["four"])).await.unwrap();
        assert_eq!(store.count(doc).await.unwrap(), 3);

        assert_eq!(store.delete(doc).await.unwrap(), 3);
        assert_eq!(store.count(doc).await.unwrap(), 0);
        assert_eq!(store.delete(doc).await.unwrap(), 0);
        assert_eq!(store.count(other).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_metadata_and_stats() {
        let store = store();
        let doc = Uuid::new_v4();
        store.add(doc, "notes.pdf", &texts(&["alpha beta", "gamma"])).await.unwrap();

        let hits = store.query("gamma", 1).await.unwrap();
        assert_eq!(hits[0].content, "gamma");
        assert_eq!(hits[0].metadata.filename, "notes.pdf");
        assert_eq!(hits[0].metadata.chunk_index, 1);
        assert_eq!(hits[0].metadata.chunk_length, 5);

        assert_eq!(
            store.stats().await.unwrap(),
            StoreStats { total_chunks: 2, unique_documents: 1 }
        );

        store.reset().await.unwrap();
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
        assert!(store.query("gamma", 0).await.unwrap().is_empty());
    }
}
