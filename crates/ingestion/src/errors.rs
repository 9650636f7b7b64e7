//! Ingestion pipeline error types

use ragnarok_common::document::ExtractionMethod;
use ragnarok_common::errors::AppError;
use thiserror::Error;

/// Longest `processing_error` persisted on a failed document, in characters
pub const MAX_ERROR_CHARS: usize = 1000;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("no text could be extracted (method: {method})")]
    ExtractionFailure { method: ExtractionMethod },

    #[error("no chunks could be created from extracted text")]
    ChunkingFailure,

    #[error("failed to store chunks: {0}")]
    StorageFailure(String),

    #[error("cannot read {path}: {source}")]
    TransientIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Internal(#[from] AppError),
}

impl IngestionError {
    /// Message persisted as the document's `processing_error`
    pub fn failure_message(&self) -> String {
        truncate_chars(&self.to_string(), MAX_ERROR_CHARS)
    }

    /// Extraction method to record alongside the failure, if extraction ran
    pub fn method(&self) -> Option<ExtractionMethod> {
        match self {
            IngestionError::ExtractionFailure { method } => Some(*method),
            _ => None,
        }
    }
}

/// First `max` characters of `s`, never splitting a character
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
