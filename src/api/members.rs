//! Family member endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::family_member::{
    CreateFamilyMemberRequest, FamilyMemberResponse, UpdateFamilyMemberRequest,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "family_members";

#[derive(Debug, Default, Deserialize)]
pub struct MemberListQuery {
    pub family_id: Option<i64>,
}

pub fn create_member_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route("/:id", get(get_member).put(update_member).delete(delete_member))
}

pub async fn list_members(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<MemberListQuery>,
) -> AppResult<Json<Vec<FamilyMemberResponse>>> {
    Ok(Json(state.members.list(&current.user, params.family_id).await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(member_id): Path<i64>,
) -> AppResult<Json<FamilyMemberResponse>> {
    Ok(Json(state.members.get(&current.user, member_id).await?))
}

pub async fn create_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateFamilyMemberRequest>,
) -> AppResult<(StatusCode, Json<FamilyMemberResponse>)> {
    let created = state.members.create(&current.user, request).await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Added family member {}", created.member.name),
    )
    .record(created.member.id)
    .details(json!({ "family_id": created.member.family_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(member_id): Path<i64>,
    Json(request): Json<UpdateFamilyMemberRequest>,
) -> AppResult<Json<FamilyMemberResponse>> {
    let updated = state.members.update(&current.user, member_id, request).await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Updated family member {}", updated.member.name),
    )
    .record(member_id);
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(updated))
}

pub async fn delete_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(member_id): Path<i64>,
) -> AppResult<StatusCode> {
    let member = state.members.delete(&current.user, member_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Delete,
        TABLE,
        format!("Removed family member {}", member.name),
    )
    .record(member_id)
    .details(json!({ "family_id": member.family_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}
