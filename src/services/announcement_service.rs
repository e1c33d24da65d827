//! Announcement Service

use std::sync::Arc;

use sqlx::{query, query_as, FromRow, SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::announcement::{
    Announcement, AnnouncementResponse, CreateAnnouncementRequest, UpdateAnnouncementRequest,
};
use crate::models::user::User;
use crate::services::storage_service::{StorageService, UploadedFile, ALLOWED_EXTENSIONS};
use crate::services::time_provider::TimeProvider;
use crate::services::validation::required;

const FLYER_SCOPE: &str = "flyers";

const SELECT_WITH_STATS: &str = "
    SELECT a.*, u.full_name AS author_name,
           (SELECT COUNT(*) FROM announcement_views v WHERE v.announcement_id = a.id) AS view_count
    FROM announcements a LEFT JOIN users u ON u.id = a.user_id";

#[derive(FromRow)]
struct AnnouncementRow {
    #[sqlx(flatten)]
    announcement: Announcement,
    author_name: Option<String>,
    view_count: i64,
}

impl From<AnnouncementRow> for AnnouncementResponse {
    fn from(row: AnnouncementRow) -> Self {
        Self {
            has_flyer: row.announcement.flyer_path.is_some(),
            announcement: row.announcement,
            author_name: row.author_name,
            view_count: row.view_count,
        }
    }
}

#[derive(Clone)]
pub struct AnnouncementService {
    pool: SqlitePool,
    storage: StorageService,
    time_provider: Arc<dyn TimeProvider>,
}

impl AnnouncementService {
    pub fn new(pool: SqlitePool, storage: StorageService, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            storage,
            time_provider,
        }
    }

    pub async fn create(&self, author: &User, request: CreateAnnouncementRequest) -> AppResult<AnnouncementResponse> {
        let title = required("Title", &request.title)?;
        let content = required("Content", &request.content)?;

        let now = self.time_provider.now_utc();
        let id = query(
            "INSERT INTO announcements (title, content, announcement_type, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&title)
        .bind(&content)
        .bind(request.announcement_type)
        .bind(author.id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let mut conn = self.pool.acquire().await?;
        fetch_with_stats(&mut conn, id).await
    }

    /// Newest first
    pub async fn list(&self) -> AppResult<Vec<AnnouncementResponse>> {
        let rows: Vec<AnnouncementRow> =
            query_as(&format!("{} ORDER BY a.created_at DESC, a.id DESC", SELECT_WITH_STATS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(AnnouncementResponse::from).collect())
    }

    /// Fetch one announcement, counting the viewer once
    pub async fn view(&self, viewer: &User, announcement_id: i64) -> AppResult<AnnouncementResponse> {
        let mut conn = self.pool.acquire().await?;
        fetch_announcement(&mut conn, announcement_id).await?;

        query(
            "INSERT OR IGNORE INTO announcement_views (announcement_id, user_id, viewed_at) VALUES (?, ?, ?)",
        )
        .bind(announcement_id)
        .bind(viewer.id)
        .bind(self.time_provider.now_utc())
        .execute(&mut *conn)
        .await?;

        fetch_with_stats(&mut conn, announcement_id).await
    }

    pub async fn update(
        &self,
        actor: &User,
        announcement_id: i64,
        request: UpdateAnnouncementRequest,
    ) -> AppResult<AnnouncementResponse> {
        let mut conn = self.pool.acquire().await?;
        let announcement = fetch_owned(&mut conn, actor, announcement_id).await?;

        let title = match request.title.as_deref() {
            Some(title) => required("Title", title)?,
            None => announcement.title,
        };
        let content = match request.content.as_deref() {
            Some(content) => required("Content", content)?,
            None => announcement.content,
        };

        query(
            "UPDATE announcements SET title = ?, content = ?, announcement_type = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&content)
        .bind(request.announcement_type.unwrap_or(announcement.announcement_type))
        .bind(self.time_provider.now_utc())
        .bind(announcement_id)
        .execute(&mut *conn)
        .await?;

        fetch_with_stats(&mut conn, announcement_id).await
    }

    pub async fn delete(&self, actor: &User, announcement_id: i64) -> AppResult<Announcement> {
        let mut conn = self.pool.acquire().await?;
        let announcement = fetch_owned(&mut conn, actor, announcement_id).await?;
        query("DELETE FROM announcements WHERE id = ?")
            .bind(announcement_id)
            .execute(&mut *conn)
            .await?;
        if let Some(path) = &announcement.flyer_path {
            self.storage.remove(path).await;
        }
        Ok(announcement)
    }

    /// Attach or replace the flyer
    pub async fn upload_flyer(
        &self,
        actor: &User,
        announcement_id: i64,
        file: &UploadedFile,
    ) -> AppResult<AnnouncementResponse> {
        let mut conn = self.pool.acquire().await?;
        let announcement = fetch_owned(&mut conn, actor, announcement_id).await?;

        let stored = self.storage.store(FLYER_SCOPE, file, &ALLOWED_EXTENSIONS).await?;
        query("UPDATE announcements SET flyer_path = ?, flyer_filename = ?, updated_at = ? WHERE id = ?")
            .bind(&stored.stored_path)
            .bind(&stored.original_filename)
            .bind(self.time_provider.now_utc())
            .bind(announcement_id)
            .execute(&mut *conn)
            .await?;

        if let Some(previous) = &announcement.flyer_path {
            self.storage.remove(previous).await;
        }
        fetch_with_stats(&mut conn, announcement_id).await
    }

    /// Flyer filename and bytes
    pub async fn flyer(&self, announcement_id: i64) -> AppResult<(String, Vec<u8>)> {
        let mut conn = self.pool.acquire().await?;
        let announcement = fetch_announcement(&mut conn, announcement_id).await?;
        let (Some(path), Some(filename)) = (announcement.flyer_path, announcement.flyer_filename) else {
            return Err(AppError::not_found("Flyer"));
        };
        let bytes = self.storage.read(&path).await?;
        Ok((filename, bytes))
    }
}

async fn fetch_announcement(conn: &mut SqliteConnection, announcement_id: i64) -> AppResult<Announcement> {
    query_as("SELECT * FROM announcements WHERE id = ?")
        .bind(announcement_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Announcement"))
}

/// The announcement, if `actor` is its author or an admin
async fn fetch_owned(conn: &mut SqliteConnection, actor: &User, announcement_id: i64) -> AppResult<Announcement> {
    let announcement = fetch_announcement(conn, announcement_id).await?;
    if announcement.user_id != actor.id && !actor.is_admin() {
        return Err(AppError::forbidden("Only the author or an admin can change this announcement"));
    }
    Ok(announcement)
}

async fn fetch_with_stats(conn: &mut SqliteConnection, announcement_id: i64) -> AppResult<AnnouncementResponse> {
    let row: AnnouncementRow = query_as(&format!("{} WHERE a.id = ?", SELECT_WITH_STATS))
        .bind(announcement_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Announcement"))?;
    Ok(row.into())
}
