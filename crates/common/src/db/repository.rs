//! PostgreSQL document-record repository
//!
//! SeaORM access to the `documents` table behind the [`DocumentStore`] trait.

use crate::db::models::*;
use crate::db::{DbPool, DocumentStore};
use crate::document::{Document, ProcessingStatus};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    filename TEXT NOT NULL,
    filepath TEXT NOT NULL,
    upload_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    file_size BIGINT,
    page_count INTEGER,
    processing_status TEXT NOT NULL DEFAULT 'pending',
    extraction_method TEXT,
    processing_start_time TIMESTAMPTZ,
    processing_end_time TIMESTAMPTZ,
    processing_duration DOUBLE PRECISION,
    text_length BIGINT,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    processing_error TEXT,
    content_preview TEXT,
    key_topics JSONB NOT NULL DEFAULT '[]'::jsonb
);
CREATE INDEX IF NOT EXISTS documents_status_idx ON documents (processing_status);
"#;

/// Repository for document records
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    /// Create the `documents` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        self.conn().execute_unprepared(CREATE_DOCUMENTS_TABLE).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Repository {
    async fn create(&self, filename: &str, filepath: &str) -> Result<Document> {
        let document = Document::new(filename, filepath);
        DocumentActiveModel::from(&document).insert(self.conn()).await?;
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Document::try_from)
            .transpose()
    }

    async fn update(&self, document: &Document) -> Result<()> {
        match DocumentActiveModel::from(document).update(self.conn()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(AppError::DocumentNotFound { id: document.id }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>> {
        DocumentEntity::find()
            .filter(DocumentColumn::ProcessingStatus.eq(status.as_str()))
            .order_by_asc(DocumentColumn::UploadTime)
            .all(self.conn())
            .await?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = DocumentEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }
}
