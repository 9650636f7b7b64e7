//! Error types for Ragnarok services
//!
//! Provides a shared error type with:
//! - Distinct variants for each failure mode of the core
//! - Stable machine-readable error codes
//! - Retry classification for upstream failures

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,
    DocumentNotFound,

    // State errors (5xxx)
    InvalidTransition,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    VectorStoreError,
    QueueFull,
    QueueClosed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::NotFound => 4001,
            ErrorCode::DocumentNotFound => 4002,

            ErrorCode::InvalidTransition => 5004,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::VectorStoreError => 8003,
            ErrorCode::QueueFull => 8005,
            ErrorCode::QueueClosed => 8006,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: Uuid },

    #[error("Invalid status transition for document {id}: {from} -> {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Vector store error: {message}")]
    VectorStore { message: String },

    #[error("Ingestion queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Ingestion queue is closed")]
    QueueClosed,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::VectorStore { .. } => ErrorCode::VectorStoreError,
            AppError::QueueFull { .. } => ErrorCode::QueueFull,
            AppError::QueueClosed => ErrorCode::QueueClosed,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            AppError::DatabaseConnection { .. } | AppError::QueueFull { .. } => true,
            AppError::EmbeddingError { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|k| k.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::DocumentNotFound { id: Uuid::nil() };
        assert_eq!(err.code(), ErrorCode::DocumentNotFound);
        assert_eq!(err.code().as_code(), 4002);
    }

    #[test]
    fn test_transition_error_message() {
        let err = AppError::InvalidTransition {
            id: Uuid::nil(),
            from: "completed".into(),
            to: "processing".into(),
        };
        assert!(err.to_string().contains("completed -> processing"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_queue_full_is_retryable() {
        let err = AppError::QueueFull { capacity: 8 };
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::QueueFull);
    }
}
