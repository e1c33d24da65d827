//! Family Document Service
//!
//! Parents upload reports and letters for their own family. Pastor-level
//! accounts can list and download across families.

use std::sync::Arc;

use sqlx::{query, query_as, SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::document::{DocumentType, FamilyDocument};
use crate::models::user::User;
use crate::services::storage_service::{StorageService, UploadedFile, ALLOWED_EXTENSIONS};
use crate::services::time_provider::TimeProvider;

const DOCUMENT_SCOPE: &str = "documents";

#[derive(Clone)]
pub struct DocumentService {
    pool: SqlitePool,
    storage: StorageService,
    time_provider: Arc<dyn TimeProvider>,
}

impl DocumentService {
    pub fn new(pool: SqlitePool, storage: StorageService, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            storage,
            time_provider,
        }
    }

    pub async fn upload(
        &self,
        actor: &User,
        document_type: DocumentType,
        file: &UploadedFile,
    ) -> AppResult<FamilyDocument> {
        if !actor.role.is_parent() {
            return Err(AppError::forbidden("Only parents can upload family documents"));
        }
        let family_id = actor
            .family_id
            .ok_or_else(|| AppError::bad_request("You are not assigned to a family"))?;

        let stored = self.storage.store(DOCUMENT_SCOPE, file, &ALLOWED_EXTENSIONS).await?;

        let inserted = query(
            "INSERT INTO family_documents (family_id, document_type, original_filename, stored_path,
                                           file_size, checksum, status, uploaded_by, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(family_id)
        .bind(document_type)
        .bind(&stored.original_filename)
        .bind(&stored.stored_path)
        .bind(stored.size)
        .bind(&stored.checksum)
        .bind(actor.id)
        .bind(self.time_provider.now_utc())
        .execute(&self.pool)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) => {
                self.storage.remove(&stored.stored_path).await;
                return Err(e.into());
            }
        };

        info!(document_id = id, family_id, size = stored.size, "Family document uploaded");
        let mut conn = self.pool.acquire().await?;
        fetch_document(&mut conn, id).await
    }

    /// Newest first. Pastor level may pick a family or see all.
    pub async fn list(&self, viewer: &User, family_id: Option<i64>) -> AppResult<Vec<FamilyDocument>> {
        let scope = if viewer.is_pastor_level() {
            family_id
        } else {
            match viewer.family_id {
                Some(own) if family_id.is_none() || family_id == Some(own) => Some(own),
                Some(_) => return Err(AppError::access_denied()),
                None => return Ok(Vec::new()),
            }
        };

        let documents = query_as(
            "SELECT * FROM family_documents WHERE (? IS NULL OR family_id = ?)
             ORDER BY uploaded_at DESC, id DESC",
        )
        .bind(scope)
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    /// Document metadata and its bytes
    pub async fn download(&self, viewer: &User, document_id: i64) -> AppResult<(FamilyDocument, Vec<u8>)> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_document(&mut conn, document_id).await?;
        if !viewer.can_view_family(document.family_id) {
            return Err(AppError::access_denied());
        }
        let bytes = self.storage.read(&document.stored_path).await?;
        Ok((document, bytes))
    }

    pub async fn delete(&self, actor: &User, document_id: i64) -> AppResult<FamilyDocument> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_document(&mut conn, document_id).await?;
        if !actor.can_manage_family(document.family_id) {
            return Err(AppError::access_denied());
        }
        query("DELETE FROM family_documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *conn)
            .await?;
        self.storage.remove(&document.stored_path).await;
        Ok(document)
    }
}

async fn fetch_document(conn: &mut SqliteConnection, document_id: i64) -> AppResult<FamilyDocument> {
    query_as("SELECT * FROM family_documents WHERE id = ?")
        .bind(document_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))
}
