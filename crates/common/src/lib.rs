//! Ragnarok Common Library
//!
//! Shared code for the ingestion and retrieval crates including:
//! - Document records and their processing state machine
//! - Database models and repository patterns
//! - Embedding client abstraction
//! - The vector store contract and its backends
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod document;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod vector_store;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DocumentStore, Repository};
pub use document::{Document, ExtractionMethod, ProcessingStatus};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use vector_store::{ScoredChunk, VectorStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the stored content preview, in characters
pub const CONTENT_PREVIEW_CHARS: usize = 500;
