//! Activity check-in endpoints
//!
//! Session management is nested under `/activities`; the link holders'
//! side lives in [`crate::api::public`].

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::checkin::{Attendance, CheckinSessionResponse};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "activity_checkin_sessions";

pub fn create_checkin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:id/checkin",
            get(get_checkin).post(open_checkin).delete(close_checkin),
        )
        .route("/:id/attendances", get(list_attendances))
}

pub async fn get_checkin(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<Json<CheckinSessionResponse>> {
    Ok(Json(state.checkins.session(&current.user, activity_id).await?))
}

pub async fn open_checkin(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<Json<CheckinSessionResponse>> {
    let session = state.checkins.open_session(&current.user, activity_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Opened check-in for activity {}", activity_id),
    )
    .record(activity_id)
    .details(json!({ "valid_from": session.valid_from, "valid_until": session.valid_until }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(session))
}

pub async fn close_checkin(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<Json<CheckinSessionResponse>> {
    let session = state.checkins.close_session(&current.user, activity_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        TABLE,
        format!("Closed check-in for activity {}", activity_id),
    )
    .record(activity_id);
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(session))
}

pub async fn list_attendances(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(activity_id): Path<i64>,
) -> AppResult<Json<Vec<Attendance>>> {
    Ok(Json(state.checkins.attendances(&current.user, activity_id).await?))
}
