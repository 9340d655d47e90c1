//! Persistence seam for ingested documents

use crate::errors::IngestionError;
use async_trait::async_trait;
use mindpub_common::config::IngestionConfig;
use mindpub_common::db::models::{NewDocument, NewPage};
use mindpub_common::db::{Repository, PAGE_PARAMS_PER_ROW};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Where documents and their pages end up
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and all of its pages atomically; returns the new id
    async fn create_document(
        &self,
        document: NewDocument,
        pages: &[NewPage],
    ) -> Result<Uuid, IngestionError>;

    /// Overwrite the pages of an existing document, dropping any beyond the new total
    async fn replace_pages(&self, document_id: Uuid, pages: &[NewPage])
        -> Result<(), IngestionError>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct DatabaseStore {
    repository: Repository,
    batch_size: usize,
}

impl DatabaseStore {
    /// `batch_size` is clamped so one upsert never exceeds the bind-parameter ceiling
    pub fn new(repository: Repository, config: &IngestionConfig) -> Self {
        Self {
            repository,
            batch_size: config.effective_batch_size(PAGE_PARAMS_PER_ROW),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl DocumentStore for DatabaseStore {
    async fn create_document(
        &self,
        document: NewDocument,
        pages: &[NewPage],
    ) -> Result<Uuid, IngestionError> {
        let created = self
            .repository
            .create_document_with_pages(document, pages, self.batch_size)
            .await?;
        Ok(created.id)
    }

    async fn replace_pages(
        &self,
        document_id: Uuid,
        pages: &[NewPage],
    ) -> Result<(), IngestionError> {
        self.repository
            .replace_pages(document_id, pages, self.batch_size)
            .await?;
        Ok(())
    }
}

/// A document held by [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document: NewDocument,
    pub pages: Vec<NewPage>,
}

/// In-process store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<Uuid, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<StoredDocument> {
        self.documents.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(
        &self,
        document: NewDocument,
        pages: &[NewPage],
    ) -> Result<Uuid, IngestionError> {
        let id = Uuid::new_v4();
        let mut pages = pages.to_vec();
        pages.sort_by_key(|p| p.page_number);

        debug!(document_id = %id, pages = pages.len(), "Document stored in memory");
        self.documents
            .write()
            .await
            .insert(id, StoredDocument { document, pages });
        Ok(id)
    }

    async fn replace_pages(
        &self,
        document_id: Uuid,
        pages: &[NewPage],
    ) -> Result<(), IngestionError> {
        let mut documents = self.documents.write().await;
        let stored = documents.get_mut(&document_id).ok_or_else(|| {
            IngestionError::Storage(format!("Document not found: {}", document_id))
        })?;

        let mut by_number: HashMap<i32, NewPage> = stored
            .pages
            .drain(..)
            .map(|p| (p.page_number, p))
            .collect();
        for page in pages {
            by_number.insert(page.page_number, page.clone());
        }

        let total = pages.len() as i32;
        let mut merged: Vec<NewPage> = by_number
            .into_values()
            .filter(|p| p.page_number <= total)
            .collect();
        merged.sort_by_key(|p| p.page_number);

        stored.pages = merged;
        stored.document.page_count = total;
        Ok(())
    }
}
