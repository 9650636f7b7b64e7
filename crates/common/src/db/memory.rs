//! In-memory document store for tests and single-process runs.

use crate::db::DocumentStore;
use crate::document::{Document, ProcessingStatus};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Uuid, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, replacing any with the same id
    pub async fn insert(&self, document: Document) {
        self.documents.write().await.insert(document.id, document);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, filename: &str, filepath: &str) -> Result<Document> {
        let document = Document::new(filename, filepath);
        self.insert(document.clone()).await;
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn update(&self, document: &Document) -> Result<()> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(AppError::DocumentNotFound { id: document.id }),
        }
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut matching: Vec<Document> = documents
            .values()
            .filter(|d| d.processing_status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|d| d.upload_time);
        Ok(matching)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_create_update_and_query_by_status() {
        let store = MemoryDocumentStore::new();
        let mut doc = store.create("a.pdf", "/u/a.pdf").await.unwrap();
        store.create("b.pdf", "/u/b.pdf").await.unwrap();

        assert_eq!(store.list_by_status(ProcessingStatus::Pending).await.unwrap().len(), 2);

        doc.begin_processing(Utc::now(), Some(1), Some(1)).unwrap();
        assert_ok!(store.update(&doc).await);

        let processing = store.list_by_status(ProcessingStatus::Processing).await.unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, doc.id);
    }

    #[tokio::test]
    async fn test_update_unknown_document_fails() {
        let store = MemoryDocumentStore::new();
        let ghost = Document::new("ghost.pdf", "/nowhere");
        assert_err!(store.update(&ghost).await);
        assert!(!store.delete(ghost.id).await.unwrap());
    }
}
