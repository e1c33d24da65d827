//! Family document endpoints

use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::api::uploads::{attachment, read_form};
use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::document::{DocumentListQuery, DocumentType, FamilyDocument};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "family_documents";

pub fn create_document_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route("/upload", post(upload_document))
        .route("/:id/download", get(download_document))
        .route("/:id", delete(delete_document))
}

pub async fn list_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<FamilyDocument>>> {
    Ok(Json(state.documents.list(&current.user, params.family_id).await?))
}

/// Multipart form with `document_type` (report or letter) and a `file` part
pub async fn upload_document(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<FamilyDocument>)> {
    let form = read_form(multipart, "file").await?;
    let document_type = form
        .field("document_type")
        .ok_or_else(|| AppError::bad_request("document_type is required"))
        .and_then(|raw| {
            DocumentType::from_str(raw.trim())
                .map_err(|_| AppError::validation_error("document_type must be 'report' or 'letter'"))
        })?;

    let document = state
        .documents
        .upload(&current.user, document_type, &form.file)
        .await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Uploaded {} {}", document.document_type, document.original_filename),
    )
    .record(document.id)
    .details(json!({ "family_id": document.family_id, "file_size": document.file_size }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn download_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
) -> AppResult<Response> {
    let (document, bytes) = state.documents.download(&current.user, document_id).await?;
    Ok(attachment(&document.original_filename, bytes))
}

pub async fn delete_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
) -> AppResult<StatusCode> {
    let document = state.documents.delete(&current.user, document_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Delete,
        TABLE,
        format!("Deleted document {}", document.original_filename),
    )
    .record(document.id)
    .details(json!({ "family_id": document.family_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}
