//! Announcement endpoints, including flyer upload and download

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::api::uploads::{attachment, read_form};
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::announcement::{
    AnnouncementResponse, CreateAnnouncementRequest, UpdateAnnouncementRequest,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "announcements";

pub fn create_announcement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_announcements).post(create_announcement))
        .route(
            "/:id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
        .route("/:id/flyer", get(download_flyer).post(upload_flyer))
}

pub async fn list_announcements(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> AppResult<Json<Vec<AnnouncementResponse>>> {
    Ok(Json(state.announcements.list().await?))
}

/// Counts a view for the caller
pub async fn get_announcement(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(announcement_id): Path<i64>,
) -> AppResult<Json<AnnouncementResponse>> {
    Ok(Json(state.announcements.view(&current.user, announcement_id).await?))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateAnnouncementRequest>,
) -> AppResult<(StatusCode, Json<AnnouncementResponse>)> {
    let created = state.announcements.create(&current.user, request).await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Published announcement {}", created.announcement.title),
    )
    .record(created.announcement.id)
    .details(json!({ "announcement_type": created.announcement.announcement_type }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(announcement_id): Path<i64>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> AppResult<Json<AnnouncementResponse>> {
    let updated = state
        .announcements
        .update(&current.user, announcement_id, request)
        .await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Updated announcement {}", updated.announcement.title),
    )
    .record(announcement_id);
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(updated))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(announcement_id): Path<i64>,
) -> AppResult<StatusCode> {
    let deleted = state.announcements.delete(&current.user, announcement_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Delete,
        TABLE,
        format!("Deleted announcement {}", deleted.title),
    )
    .record(announcement_id);
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Multipart form with a `file` part
pub async fn upload_flyer(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(announcement_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<AnnouncementResponse>> {
    let form = read_form(multipart, "file").await?;
    let updated = state
        .announcements
        .upload_flyer(&current.user, announcement_id, &form.file)
        .await?;

    let entry = AuditEntry::new(AuditAction::Update, TABLE, "Uploaded announcement flyer")
        .record(announcement_id)
        .details(json!({
            "filename": updated.announcement.flyer_filename,
            "size": form.file.bytes.len(),
        }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(updated))
}

pub async fn download_flyer(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(announcement_id): Path<i64>,
) -> AppResult<Response> {
    let (filename, bytes) = state.announcements.flyer(announcement_id).await?;
    Ok(attachment(&filename, bytes))
}
