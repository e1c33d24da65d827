//! Audit log endpoints

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};

use crate::api::extractors::{AdminUser, CurrentUser};
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::system_log::{SummaryQuery, SystemLog, SystemLogQuery, SystemLogSummary};

pub fn create_system_log_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_logs))
        .route("/summary", get(summary))
}

/// Non-admins only ever see their own entries
pub async fn list_logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filters): Query<SystemLogQuery>,
) -> AppResult<Json<Vec<SystemLog>>> {
    Ok(Json(state.audit.query(&current.user, &filters).await?))
}

pub async fn summary(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<SummaryQuery>,
) -> AppResult<Json<SystemLogSummary>> {
    Ok(Json(state.audit.summary(params.days).await?))
}
