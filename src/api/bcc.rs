//! BCC program endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::bcc::{
    BccClassCompletion, BccFamilyStatus, BccIncompleteMember, BccMemberProgress,
    RecordCompletionRequest,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

#[derive(Debug, Default, Deserialize)]
pub struct IncompleteQuery {
    pub family_id: Option<i64>,
}

pub fn create_bcc_routes() -> Router<AppState> {
    Router::new()
        .route("/members/:id/progress", get(member_progress))
        .route("/members/:id/classes", post(record_completion))
        .route("/incomplete", get(incomplete_members))
        .route("/families/:id/status", get(family_status))
}

pub async fn member_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(member_id): Path<i64>,
) -> AppResult<Json<BccMemberProgress>> {
    Ok(Json(state.bcc.progress(&current.user, member_id).await?))
}

pub async fn record_completion(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(member_id): Path<i64>,
    Json(request): Json<RecordCompletionRequest>,
) -> AppResult<Json<BccClassCompletion>> {
    let completion = state
        .bcc
        .record_completion(&current.user, member_id, request.class_number)
        .await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        "bcc_class_completions",
        format!("Recorded BCC class {}", completion.class_number),
    )
    .record(completion.id)
    .details(json!({ "member_id": member_id, "class_number": completion.class_number }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(completion))
}

pub async fn incomplete_members(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<IncompleteQuery>,
) -> AppResult<Json<Vec<BccIncompleteMember>>> {
    Ok(Json(state.bcc.incomplete(&current.user, params.family_id).await?))
}

pub async fn family_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<i64>,
) -> AppResult<Json<BccFamilyStatus>> {
    Ok(Json(state.bcc.family_status(&current.user, family_id).await?))
}
