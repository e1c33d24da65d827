//! Church-wide shared document endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::api::uploads::{attachment, read_form};
use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::shared_document::{
    SharedDocument, SharedDocumentList, SharedDocumentQuery, SharedDocumentStats, UpdateSharedDocumentRequest,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "shared_documents";

pub fn create_shared_document_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_shared_documents))
        .route("/upload", post(upload_shared_document))
        .route("/stats", get(shared_document_stats))
        .route("/:id/download", get(download_shared_document))
        .route(
            "/:id",
            get(get_shared_document)
                .put(update_shared_document)
                .delete(delete_shared_document),
        )
}

pub async fn list_shared_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<SharedDocumentQuery>,
) -> AppResult<Json<SharedDocumentList>> {
    Ok(Json(state.shared_documents.list(&current.user, &params).await?))
}

/// Multipart form with a `file` part and optional `description` and `is_public` fields
pub async fn upload_shared_document(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SharedDocument>)> {
    let form = read_form(multipart, "file").await?;
    let is_public = match form.field("is_public").map(str::trim) {
        None | Some("") => true,
        Some(raw) => raw
            .parse::<bool>()
            .map_err(|_| AppError::validation_error("is_public must be 'true' or 'false'"))?,
    };
    let description = form.field("description").map(str::to_string);

    let document = state
        .shared_documents
        .upload(&current.user, &form.file, description, is_public)
        .await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Uploaded shared document {}", document.original_filename),
    )
    .record(document.id)
    .details(json!({ "file_size": document.file_size, "is_public": document.is_public }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn shared_document_stats(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> AppResult<Json<SharedDocumentStats>> {
    Ok(Json(state.shared_documents.stats().await?))
}

pub async fn get_shared_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
) -> AppResult<Json<SharedDocument>> {
    Ok(Json(state.shared_documents.get(&current.user, document_id).await?))
}

pub async fn update_shared_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
    Json(request): Json<UpdateSharedDocumentRequest>,
) -> AppResult<Json<SharedDocument>> {
    let document = state
        .shared_documents
        .update(&current.user, document_id, request)
        .await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Updated shared document {}", document.name),
    )
    .record(document.id)
    .details(json!({ "is_public": document.is_public }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(document))
}

pub async fn delete_shared_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
) -> AppResult<StatusCode> {
    let document = state.shared_documents.delete(&current.user, document_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Delete,
        TABLE,
        format!("Deleted shared document {}", document.original_filename),
    )
    .record(document.id);
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_shared_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(document_id): Path<i64>,
) -> AppResult<Response> {
    let (document, bytes) = state.shared_documents.download(&current.user, document_id).await?;
    Ok(attachment(&document.original_filename, bytes))
}
