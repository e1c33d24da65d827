//! Unauthenticated endpoints reached through a shared check-in link

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use crate::app::AppState;
use crate::error::AppResult;
use crate::models::checkin::{Attendance, AttendanceRequest, CheckinInfo, PublicFamily};

pub fn create_public_routes() -> Router<AppState> {
    Router::new()
        .route("/activity-checkin/:token", get(checkin_info))
        .route("/activity-checkin/:token/attend", post(attend))
        .route("/families", get(list_families))
}

pub async fn checkin_info(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<CheckinInfo>> {
    Ok(Json(state.checkins.public_info(&token).await?))
}

pub async fn attend(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<AttendanceRequest>,
) -> AppResult<(StatusCode, Json<Attendance>)> {
    let attendance = state.checkins.attend(&token, request).await?;
    Ok((StatusCode::CREATED, Json(attendance)))
}

pub async fn list_families(State(state): State<AppState>) -> AppResult<Json<Vec<PublicFamily>>> {
    Ok(Json(state.checkins.public_families().await?))
}
