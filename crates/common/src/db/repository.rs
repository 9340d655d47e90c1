//! Repository pattern for database operations
//!
//! Documents and their pages are always written together inside one
//! transaction, so a failed ingestion never leaves partial rows behind.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, Set, Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

/// Bound parameters per page row: document_id, page_number, content,
/// chapter_number, chapter_title
pub const PAGE_PARAMS_PER_ROW: usize = 5;

/// Build one multi-row page upsert.
///
/// Rows conflict on `(document_id, page_number)`; re-ingestion overwrites
/// content and chapter attributes in place.
pub fn page_upsert_statement(document_id: Uuid, pages: &[NewPage]) -> Statement {
    let mut sql = String::from(
        "INSERT INTO pages (document_id, page_number, content, chapter_number, chapter_title) VALUES ",
    );
    let mut values: Vec<sea_orm::Value> = Vec::with_capacity(pages.len() * PAGE_PARAMS_PER_ROW);

    for (row, page) in pages.iter().enumerate() {
        if row > 0 {
            sql.push_str(", ");
        }
        let base = row * PAGE_PARAMS_PER_ROW;
        sql.push_str(&format!(
            "(${}, ${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5
        ));

        values.push(document_id.into());
        values.push(page.page_number.into());
        values.push(page.content.clone().into());
        values.push(page.chapter_number.into());
        values.push(page.chapter_title.clone().into());
    }

    sql.push_str(
        " ON CONFLICT (document_id, page_number) DO UPDATE SET \
         content = EXCLUDED.content, \
         chapter_number = EXCLUDED.chapter_number, \
         chapter_title = EXCLUDED.chapter_title",
    );

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Repository for data access operations
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
        self.pool.conn()
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a document and all of its pages in one transaction
    pub async fn create_document_with_pages(
        &self,
        document: NewDocument,
        pages: &[NewPage],
        batch_size: usize,
    ) -> Result<Document> {
        let txn = self.conn().begin().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to begin: {}", e),
        })?;

        let now = chrono::Utc::now();
        let model = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(document.title),
            author: Set(document.author),
            description: Set(document.description),
            category: Set(document.category),
            page_count: Set(document.page_count),
            cover_path: Set(document.cover_path),
            source_path: Set(document.source_path),
            source_format: Set(document.source_format),
            release_date: Set(document.release_date),
            publisher: Set(document.publisher),
            subject: Set(document.subject),
            tags: Set(serde_json::json!(document.tags)),
            rights: Set(document.rights),
            language: Set(document.language),
            identifier: Set(document.identifier),
            uploaded_by: Set(document.uploaded_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        for batch in pages.chunks(batch_size.max(1)) {
            txn.execute(page_upsert_statement(model.id, batch)).await?;
            debug!(document_id = %model.id, rows = batch.len(), "Page batch upserted");
        }

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to commit: {}", e),
        })?;

        Ok(model)
    }

    /// Overwrite every page of an existing document.
    ///
    /// Pages beyond the new total are deleted and `page_count` is updated.
    pub async fn replace_pages(
        &self,
        document_id: Uuid,
        pages: &[NewPage],
        batch_size: usize,
    ) -> Result<Document> {
        let txn = self.conn().begin().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to begin: {}", e),
        })?;

        let existing = DocumentEntity::find_by_id(document_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;

        for batch in pages.chunks(batch_size.max(1)) {
            txn.execute(page_upsert_statement(document_id, batch)).await?;
        }

        let total = pages.len() as i32;
        let removed = PageEntity::delete_many()
            .filter(PageColumn::DocumentId.eq(document_id))
            .filter(PageColumn::PageNumber.gt(total))
            .exec(&txn)
            .await?;

        let mut document: DocumentActiveModel = existing.into();
        document.page_count = Set(total);
        document.updated_at = Set(chrono::Utc::now().into());
        let document = document.update(&txn).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Failed to commit: {}", e),
        })?;

        debug!(
            document_id = %document_id,
            total,
            removed = removed.rows_affected,
            "Pages replaced"
        );

        Ok(document)
    }
}
