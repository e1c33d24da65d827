//! Shared Document Service
//!
//! Church-wide document library. Uploaders manage their own files and
//! admins manage all of them.

use std::sync::Arc;

use chrono::Duration;
use sqlx::{query, query_as, query_scalar, SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::shared_document::{
    SharedDocument, SharedDocumentList, SharedDocumentQuery, SharedDocumentStats, UpdateSharedDocumentRequest,
};
use crate::models::user::User;
use crate::services::storage_service::{content_type, StorageService, UploadedFile, SHARED_EXTENSIONS};
use crate::services::time_provider::TimeProvider;

const SHARED_SCOPE: &str = "shared_documents";
const RECENT_DAYS: i64 = 7;

const VISIBLE_FILTER: &str = "(? OR is_public = TRUE OR uploaded_by = ?)
     AND (? IS NULL OR name LIKE ? OR COALESCE(description, '') LIKE ?)
     AND (? IS NULL OR mime_type LIKE ?)
     AND (? IS NULL OR uploaded_by = ?)";

#[derive(Clone)]
pub struct SharedDocumentService {
    pool: SqlitePool,
    storage: StorageService,
    time_provider: Arc<dyn TimeProvider>,
}

impl SharedDocumentService {
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
        file: &UploadedFile,
        description: Option<String>,
        is_public: bool,
    ) -> AppResult<SharedDocument> {
        let stored = self.storage.store(SHARED_SCOPE, file, &SHARED_EXTENSIONS).await?;
        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let inserted = query(
            "INSERT INTO shared_documents (name, original_filename, stored_path, file_size, mime_type, description,
                                           uploaded_by, is_public, downloads, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&stored.original_filename)
        .bind(&stored.original_filename)
        .bind(&stored.stored_path)
        .bind(stored.size)
        .bind(content_type(&stored.original_filename))
        .bind(&description)
        .bind(actor.id)
        .bind(is_public)
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

        info!(shared_document_id = id, size = stored.size, is_public, "Shared document uploaded");
        let mut conn = self.pool.acquire().await?;
        fetch_shared(&mut conn, id).await
    }

    /// Newest first, one page at a time
    pub async fn list(&self, viewer: &User, filter: &SharedDocumentQuery) -> AppResult<SharedDocumentList> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| format!("%{}%", text));
        let mime_prefix = filter
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| format!("{}%", text));

        let total: i64 = query_scalar(&format!("SELECT COUNT(*) FROM shared_documents WHERE {}", VISIBLE_FILTER))
            .bind(viewer.is_admin())
            .bind(viewer.id)
            .bind(&search)
            .bind(&search)
            .bind(&search)
            .bind(&mime_prefix)
            .bind(&mime_prefix)
            .bind(filter.uploaded_by)
            .bind(filter.uploaded_by)
            .fetch_one(&self.pool)
            .await?;

        let documents = query_as(&format!(
            "SELECT * FROM shared_documents WHERE {}
             ORDER BY uploaded_at DESC, id DESC LIMIT ? OFFSET ?",
            VISIBLE_FILTER
        ))
        .bind(viewer.is_admin())
        .bind(viewer.id)
        .bind(&search)
        .bind(&search)
        .bind(&search)
        .bind(&mime_prefix)
        .bind(&mime_prefix)
        .bind(filter.uploaded_by)
        .bind(filter.uploaded_by)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        let per_page = filter.limit();
        Ok(SharedDocumentList {
            documents,
            total,
            page: filter.page.max(1),
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    pub async fn get(&self, viewer: &User, document_id: i64) -> AppResult<SharedDocument> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_shared(&mut conn, document_id).await?;
        if !can_view(viewer, &document) {
            return Err(AppError::access_denied());
        }
        Ok(document)
    }

    pub async fn update(
        &self,
        actor: &User,
        document_id: i64,
        request: UpdateSharedDocumentRequest,
    ) -> AppResult<SharedDocument> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_shared(&mut conn, document_id).await?;
        if !can_manage(actor, &document) {
            return Err(AppError::forbidden("Not authorized to update this document"));
        }

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::validation_error("Document name cannot be empty")),
            Some(name) => name.to_string(),
            None => document.name,
        };

        query("UPDATE shared_documents SET name = ?, description = ?, is_public = ? WHERE id = ?")
            .bind(&name)
            .bind(request.description.or(document.description))
            .bind(request.is_public.unwrap_or(document.is_public))
            .bind(document_id)
            .execute(&mut *conn)
            .await?;

        fetch_shared(&mut conn, document_id).await
    }

    pub async fn delete(&self, actor: &User, document_id: i64) -> AppResult<SharedDocument> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_shared(&mut conn, document_id).await?;
        if !can_manage(actor, &document) {
            return Err(AppError::forbidden("Not authorized to delete this document"));
        }
        query("DELETE FROM shared_documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *conn)
            .await?;
        self.storage.remove(&document.stored_path).await;
        Ok(document)
    }

    /// Document metadata and bytes. Each successful download is counted.
    pub async fn download(&self, viewer: &User, document_id: i64) -> AppResult<(SharedDocument, Vec<u8>)> {
        let mut conn = self.pool.acquire().await?;
        let document = fetch_shared(&mut conn, document_id).await?;
        if !can_view(viewer, &document) {
            return Err(AppError::access_denied());
        }
        let bytes = self.storage.read(&document.stored_path).await?;

        query("UPDATE shared_documents SET downloads = downloads + 1 WHERE id = ?")
            .bind(document_id)
            .execute(&mut *conn)
            .await?;
        Ok((document, bytes))
    }

    pub async fn stats(&self) -> AppResult<SharedDocumentStats> {
        let mut conn = self.pool.acquire().await?;
        let (total_documents, total_downloads): (i64, i64) =
            query_as("SELECT COUNT(*), COALESCE(SUM(downloads), 0) FROM shared_documents")
                .fetch_one(&mut *conn)
                .await?;

        let since = self.time_provider.now_utc() - Duration::days(RECENT_DAYS);
        let recent_uploads: i64 = query_scalar("SELECT COUNT(*) FROM shared_documents WHERE uploaded_at >= ?")
            .bind(since)
            .fetch_one(&mut *conn)
            .await?;

        let types: Vec<(String, i64)> =
            query_as("SELECT mime_type, COUNT(*) FROM shared_documents GROUP BY mime_type")
                .fetch_all(&mut *conn)
                .await?;

        Ok(SharedDocumentStats {
            total_documents,
            total_downloads,
            recent_uploads,
            types: types.into_iter().collect(),
        })
    }
}

fn can_view(viewer: &User, document: &SharedDocument) -> bool {
    document.is_public || can_manage(viewer, document)
}

fn can_manage(actor: &User, document: &SharedDocument) -> bool {
    actor.is_admin() || document.uploaded_by == Some(actor.id)
}

async fn fetch_shared(conn: &mut SqliteConnection, document_id: i64) -> AppResult<SharedDocument> {
    query_as("SELECT * FROM shared_documents WHERE id = ?")
        .bind(document_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))
}
