//! Family endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;

use crate::api::extractors::{AdminUser, CurrentUser};
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::family::{CreateFamilyRequest, Family, FamilyResponse, UpdateFamilyRequest};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "families";

pub fn create_family_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_families).post(create_family))
        .route("/:id", get(get_family).put(update_family).delete(delete_family))
}

pub async fn list_families(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<FamilyResponse>>> {
    Ok(Json(state.families.list(&current.user).await?))
}

pub async fn get_family(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<i64>,
) -> AppResult<Json<FamilyResponse>> {
    Ok(Json(state.families.get(&current.user, family_id).await?))
}

pub async fn create_family(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateFamilyRequest>,
) -> AppResult<(StatusCode, Json<Family>)> {
    let family = state.families.create(request).await?;

    let entry = AuditEntry::new(AuditAction::Create, TABLE, format!("Created family {}", family.name))
        .record(family.id)
        .details(json!({ "category": family.category }));
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok((StatusCode::CREATED, Json(family)))
}

pub async fn update_family(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(family_id): Path<i64>,
    Json(request): Json<UpdateFamilyRequest>,
) -> AppResult<Json<Family>> {
    let family = state.families.update(family_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Update, TABLE, format!("Updated family {}", family.name))
        .record(family.id)
        .details(json!({ "name": family.name, "category": family.category }));
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok(Json(family))
}

pub async fn delete_family(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(family_id): Path<i64>,
) -> AppResult<StatusCode> {
    let family = state.families.delete(family_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, TABLE, format!("Deleted family {}", family.name))
        .record(family.id);
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}
