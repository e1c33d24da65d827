//! Family activity endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::activity::{CreateActivityRequest, FamilyActivity, UpdateActivityRequest};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "family_activities";

pub fn create_activity_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_activity))
        .route("/family/:family_id", get(list_family_activities))
        .route("/:id", get(get_activity).put(update_activity).delete(delete_activity))
}

pub async fn create_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateActivityRequest>,
) -> AppResult<(StatusCode, Json<FamilyActivity>)> {
    let activity = state.activities.create(&current.user, request).await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Created activity {}", activity.activity_type),
    )
    .record(activity.id)
    .details(json!({
        "family_id": activity.family_id,
        "category": activity.category,
        "date": activity.date,
    }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn list_family_activities(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<i64>,
) -> AppResult<Json<Vec<FamilyActivity>>> {
    Ok(Json(state.activities.list_for_family(&current.user, family_id).await?))
}

pub async fn get_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<Json<FamilyActivity>> {
    Ok(Json(state.activities.get(&current.user, activity_id).await?))
}

pub async fn update_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
    Json(request): Json<UpdateActivityRequest>,
) -> AppResult<Json<FamilyActivity>> {
    let activity = state.activities.update(&current.user, activity_id, request).await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Updated activity {}", activity.activity_type),
    )
    .record(activity.id)
    .details(json!({ "status": activity.status }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(activity))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<StatusCode> {
    let activity = state.activities.delete(&current.user, activity_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Delete,
        TABLE,
        format!("Deleted activity {}", activity.activity_type),
    )
    .record(activity.id)
    .details(json!({ "family_id": activity.family_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}
