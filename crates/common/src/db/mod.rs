//! Document-record persistence
//!
//! Provides:
//! - The [`DocumentStore`] capability used by the ingestion pipeline
//! - SeaORM entity models and a PostgreSQL-backed [`Repository`]
//! - An in-process [`MemoryDocumentStore`]
//! - Connection pool management

mod memory;
pub mod models;
mod repository;

pub use memory::MemoryDocumentStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::document::{Document, ProcessingStatus};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Create, update-by-id and query-by-status over Document records
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new `pending` record
    async fn create(&self, filename: &str, filepath: &str) -> Result<Document>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>>;

    /// Overwrite the stored record with `document`
    async fn update(&self, document: &Document) -> Result<()>;

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>>;

    /// Returns whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}
