//! PostgreSQL + pgvector backed vector store
//!
//! Chunks live in one table with an HNSW cosine index. Similarity is
//! `1 - (embedding <=> query)`.

use super::{check_embedding_count, chunk_id, ChunkMetadata, ScoredChunk, StoreStats, VectorStore};
use crate::db::DbPool;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PgVectorStore {
    db: DbPool,
    embedder: Arc<dyn Embedder>,
    table: String,
}

#[derive(Debug, FromQueryResult)]
struct ChunkRow {
    content: String,
    document_id: Uuid,
    filename: String,
    chunk_index: i32,
    chunk_length: i32,
    created_at: DateTimeWithTimeZone,
    similarity: f64,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total_chunks: i64,
    unique_documents: i64,
}

/// Render an embedding as a pgvector literal
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

impl PgVectorStore {
    pub fn new(db: DbPool, embedder: Arc<dyn Embedder>, table: &str) -> Result<Self> {
        let valid = !table.is_empty()
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(AppError::Configuration {
                message: format!("invalid vector table name '{}'", table),
            });
        }

        Ok(Self {
            db,
            embedder,
            table: table.to_string(),
        })
    }

    fn schema_statements(&self) -> Vec<String> {
        let table = &self.table;
        vec![
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    document_id UUID NOT NULL,
                    filename TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    chunk_length INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    embedding vector({dim}) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                dim = self.embedder.dimension()
            ),
            format!("CREATE INDEX IF NOT EXISTS {table}_document_idx ON {table} (document_id)"),
            format!(
                "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
                 USING hnsw (embedding vector_cosine_ops)"
            ),
        ]
    }

    /// Create the extension, table and indexes if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.db.connection();
        for sql in self.schema_statements() {
            conn.execute_unprepared(&sql).await?;
        }
        info!(table = %self.table, "Vector table ready");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add(&self, document_id: Uuid, filename: &str, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(chunks).await?;
        check_embedding_count(chunks.len(), embeddings.len())?;

        let created_at: DateTimeWithTimeZone = Utc::now().into();
        let txn = self.db.connection().begin().await?;

        for (index, (content, embedding)) in chunks.iter().zip(&embeddings).enumerate() {
            let sql = format!(
                r#"
                INSERT INTO {table}
                    (id, document_id, filename, chunk_index, chunk_length, content, embedding, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, '{embedding}'::vector, $7)
                "#,
                table = self.table,
                embedding = vector_literal(embedding)
            );

            txn.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    chunk_id(document_id, index).into(),
                    document_id.into(),
                    filename.into(),
                    (index as i32).into(),
                    (content.chars().count() as i32).into(),
                    content.as_str().into(),
                    created_at.into(),
                ],
            ))
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Chunk insert failed: {}", e),
            })?;
        }

        txn.commit().await?;
        debug!(%document_id, chunks = chunks.len(), "Stored chunks");
        Ok(chunks.len())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = vector_literal(&self.embedder.embed(text).await?);
        let sql = format!(
            r#"
            SELECT
                content,
                document_id,
                filename,
                chunk_index,
                chunk_length,
                created_at,
                1 - (embedding <=> '{embedding}'::vector) AS similarity
            FROM {table}
            ORDER BY embedding <=> '{embedding}'::vector, id
            LIMIT $1
            "#,
            embedding = embedding,
            table = self.table
        );

        let rows = ChunkRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![(k as i64).into()],
        ))
        .all(self.db.connection())
        .await
        .map_err(|e| AppError::VectorStore {
            message: format!("Vector search failed: {}", e),
        })?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredChunk {
                content: row.content,
                metadata: ChunkMetadata {
                    document_id: row.document_id,
                    filename: row.filename,
                    chunk_index: row.chunk_index.max(0) as usize,
                    chunk_length: row.chunk_length.max(0) as usize,
                    created_at: row.created_at.with_timezone(&Utc),
                },
                similarity: row.similarity as f32,
            })
            .collect())
    }

    async fn delete(&self, document_id: Uuid) -> Result<usize> {
        let result = self
            .db
            .connection()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                &format!("DELETE FROM {} WHERE document_id = $1", self.table),
                vec![document_id.into()],
            ))
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, document_id: Uuid) -> Result<usize> {
        let row = CountRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &format!(
                "SELECT COUNT(*) AS total_chunks, COUNT(DISTINCT document_id) AS unique_documents \
                 FROM {} WHERE document_id = $1",
                self.table
            ),
            vec![document_id.into()],
        ))
        .one(self.db.connection())
        .await?;
        Ok(row.map(|r| r.total_chunks.max(0) as usize).unwrap_or(0))
    }

    async fn reset(&self) -> Result<()> {
        self.db
            .connection()
            .execute_unprepared(&format!("DROP TABLE IF EXISTS {}", self.table))
            .await?;
        self.ensure_schema().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = CountRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            format!(
                "SELECT COUNT(*) AS total_chunks, COUNT(DISTINCT document_id) AS unique_documents \
                 FROM {}",
                self.table
            ),
        ))
        .one(self.db.connection())
        .await?;

        Ok(row
            .map(|r| StoreStats {
                total_chunks: r.total_chunks.max(0) as usize,
                unique_documents: r.unique_documents.max(0) as usize,
            })
            .unwrap_or_default())
    }
}
