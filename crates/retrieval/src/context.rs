//! Context assembly
//!
//! Turns the nearest chunks for a query into a single context string that
//! fits a character budget, dropping weak matches.

use ragnarok_common::config::RetrievalConfig;
use ragnarok_common::errors::Result;
use ragnarok_common::metrics;
use ragnarok_common::vector_store::{ScoredChunk, StoreStats, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Knobs for one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct RetrievalParams {
    #[validate(range(min = 1, max = 100))]
    pub top_k: usize,

    /// Chunks at or below this similarity are discarded
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity_threshold: f32,

    #[validate(range(min = 1))]
    pub max_context_tokens: usize,

    #[validate(range(min = 1))]
    pub chars_per_token: usize,

    /// Prefix each chunk with its source filename and relevance
    pub annotate_sources: bool,
}

impl RetrievalParams {
    /// Character ceiling for the assembled context
    pub fn char_budget(&self) -> usize {
        self.max_context_tokens.saturating_mul(self.chars_per_token)
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            max_context_tokens: config.max_context_tokens,
            chars_per_token: config.chars_per_token,
            annotate_sources: config.annotate_sources,
        }
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub context: String,
    /// Distinct source filenames in order of first appearance
    pub sources: Vec<String>,
    pub found: bool,
    /// Characters in `context`
    pub context_length: usize,
    pub chunks_used: usize,
}

/// Queries the vector store on behalf of prompt builders and search callers
#[derive(Clone)]
pub struct ContextAssembler {
    store: Arc<dyn VectorStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Build the context for `query`.
    ///
    /// Fails only on invalid parameters. A vector store error yields an
    /// empty, not-found context.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve_context(&self, query: &str, params: &RetrievalParams) -> Result<RetrievedContext> {
        params.validate()?;
        let started = Instant::now();

        let hits = match self.store.query(query, params.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Vector store query failed, continuing without context");
                metrics::record_retrieval(started.elapsed().as_secs_f64(), false, 0);
                return Ok(RetrievedContext::default());
            }
        };

        let retrieved = assemble(hits, params);
        metrics::record_retrieval(
            started.elapsed().as_secs_f64(),
            retrieved.found,
            retrieved.context_length,
        );
        debug!(
            chunks_used = retrieved.chunks_used,
            context_length = retrieved.context_length,
            sources = ?retrieved.sources,
            "Context assembled"
        );

        Ok(retrieved)
    }

    /// Raw ranked matches; empty when the store cannot be queried
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        match self.store.query(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    /// Drop every stored chunk
    pub async fn flush_all(&self) -> Result<()> {
        self.store.reset().await?;
        info!("Vector store flushed");
        Ok(())
    }

    pub async fn delete_document_chunks(&self, document_id: Uuid) -> Result<usize> {
        let removed = self.store.delete(document_id).await?;
        info!(%document_id, removed, "Document chunks deleted");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }
}

/// Filter, order and budget the hits into one context string
fn assemble(mut hits: Vec<ScoredChunk>, params: &RetrievalParams) -> RetrievedContext {
    hits.retain(|hit| hit.similarity > params.similarity_threshold);
    // Stable, so equal scores keep the store's order
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let budget = params.char_budget();
    let mut parts: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut length = 0usize;

    for hit in &hits {
        let part = if params.annotate_sources {
            format!(
                "\n--- Source: {} (Relevance: {:.2}) ---\n{}",
                hit.metadata.filename, hit.similarity, hit.content
            )
        } else {
            hit.content.clone()
        };

        // Parts are joined with a newline
        let separator = usize::from(!parts.is_empty());
        let added = part.chars().count() + separator;
        if length + added > budget {
            break;
        }

        length += added;
        parts.push(part);
        if !sources.contains(&hit.metadata.filename) {
            sources.push(hit.metadata.filename.clone());
        }
    }

    RetrievedContext {
        context: parts.join("\n"),
        found: !parts.is_empty(),
        context_length: length,
        chunks_used: parts.len(),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ragnarok_common::embeddings::HashingEmbedder;
    use ragnarok_common::errors::AppError;
    use ragnarok_common::vector_store::{ChunkMetadata, MemoryVectorStore};
    use tokio_test::{assert_err, assert_ok};

    /// Returns canned hits, or fails every query
    struct CannedStore {
        hits: Vec<ScoredChunk>,
        broken: bool,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn add(&self, _id: Uuid, _filename: &str, chunks: &[String]) -> Result<usize> {
            Ok(chunks.len())
        }

        async fn query(&self, _text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
            if self.broken {
                return Err(AppError::VectorStore { message: "index unavailable".into() });
            }
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        async fn delete(&self, _id: Uuid) -> Result<usize> {
            Ok(0)
        }

        async fn count(&self, _id: Uuid) -> Result<usize> {
            Ok(0)
        }

        async fn reset(&self) -> Result<()> {
            Ok(())
        }

        async fn stats(&self) -> Result<StoreStats> {
            Ok(StoreStats::default())
        }
    }

    fn hit(content: &str, filename: &str, similarity: f32) -> ScoredChunk {
        ScoredChunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                document_id: Uuid::nil(),
                filename: filename.to_string(),
                chunk_index: 0,
                chunk_length: content.chars().count(),
                created_at: Utc::now(),
            },
            similarity,
        }
    }

    fn assembler(hits: Vec<ScoredChunk>) -> ContextAssembler {
        ContextAssembler::new(Arc::new(CannedStore { hits, broken: false }))
    }

    #[tokio::test]
    async fn test_below_threshold_is_not_found() {
        let retrieved = assembler(vec![hit("barely related", "a.pdf", 0.1)])
            .retrieve_context("query", &RetrievalParams::default())
            .await
            .unwrap();

        assert!(!retrieved.found);
        assert_eq!(retrieved.context, "");
        assert_eq!(retrieved.context_length, 0);
        assert!(retrieved.sources.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let params = RetrievalParams { similarity_threshold: 0.5, ..Default::default() };
        let retrieved = assembler(vec![hit("exact", "a.pdf", 0.5), hit("above", "b.pdf", 0.51)])
            .retrieve_context("query", &params)
            .await
            .unwrap();

        assert_eq!(retrieved.chunks_used, 1);
        assert_eq!(retrieved.sources, vec!["b.pdf"]);
    }

    #[tokio::test]
    async fn test_annotation_and_source_order() {
        let retrieved = assembler(vec![
            hit("second", "b.pdf", 0.7),
            hit("first", "a.pdf", 0.9),
            hit("third", "a.pdf", 0.6),
        ])
        .retrieve_context("query", &RetrievalParams::default())
        .await
        .unwrap();

        assert!(retrieved.found);
        assert_eq!(retrieved.sources, vec!["a.pdf", "b.pdf"]);
        assert_eq!(retrieved.chunks_used, 3);
        assert!(retrieved
            .context
            .starts_with("\n--- Source: a.pdf (Relevance: 0.90) ---\nfirst\n\n--- Source: b.pdf"));
        assert_eq!(retrieved.context_length, retrieved.context.chars().count());
    }

    #[tokio::test]
    async fn test_budget_stops_before_overflow() {
        let params = RetrievalParams {
            max_context_tokens: 3,
            chars_per_token: 4,
            annotate_sources: false,
            ..Default::default()
        };
        // 12 character budget: "aaaaa" + "\n" + "bbbbb" fits, "cc" would not
        let retrieved = assembler(vec![
            hit("aaaaa", "a.pdf", 0.9),
            hit("bbbbb", "b.pdf", 0.8),
            hit("cc", "c.pdf", 0.7),
        ])
        .retrieve_context("query", &params)
        .await
        .unwrap();

        assert_eq!(retrieved.context, "aaaaa\nbbbbb");
        assert_eq!(retrieved.context_length, 11);
        assert_eq!(retrieved.sources, vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_store_error_degrades_to_not_found() {
        let assembler = ContextAssembler::new(Arc::new(CannedStore { hits: vec![], broken: true }));

        let retrieved = assert_ok!(assembler.retrieve_context("query", &RetrievalParams::default()).await);
        assert_eq!(retrieved, RetrievedContext::default());
        assert!(assembler.search("query", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let params = RetrievalParams { top_k: 0, ..Default::default() };
        assert_err!(assembler(vec![]).retrieve_context("query", &params).await);

        let params = RetrievalParams { similarity_threshold: 1.5, ..Default::default() };
        assert_err!(assembler(vec![]).retrieve_context("query", &params).await);
    }

    #[tokio::test]
    async fn test_semantic_context_and_admin_operations() {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(HashingEmbedder::new(384))));
        let ml = Uuid::new_v4();
        let pasta = Uuid::new_v4();
        store
            .add(ml, "ml.pdf", &["neural networks learn representations".to_string()])
            .await
            .unwrap();
        store
            .add(pasta, "pasta.pdf", &["boil the pasta in salted water".to_string()])
            .await
            .unwrap();
        let assembler = ContextAssembler::new(store);

        let retrieved = assembler
            .retrieve_context("how do neural networks learn", &RetrievalParams::default())
            .await
            .unwrap();
        assert!(retrieved.found);
        assert_eq!(retrieved.sources[0], "ml.pdf");

        assert_eq!(
            assembler.stats().await.unwrap(),
            StoreStats { total_chunks: 2, unique_documents: 2 }
        );
        assert_eq!(assembler.delete_document_chunks(ml).await.unwrap(), 1);
        assert_eq!(assembler.delete_document_chunks(ml).await.unwrap(), 0);

        assert_ok!(assembler.flush_all().await);
        assert_eq!(assembler.stats().await.unwrap(), StoreStats::default());
    }
}
