//! Dashboard endpoints

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use crate::api::extractors::{CurrentUser, PastorUser};
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::dashboard::{ChurchOverview, FamilyStats};

pub fn create_dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/church-overview", get(church_overview))
        .route("/family/:id/stats", get(family_stats))
}

pub async fn church_overview(
    State(state): State<AppState>,
    _pastor: PastorUser,
) -> AppResult<Json<ChurchOverview>> {
    Ok(Json(state.dashboard.church_overview().await?))
}

pub async fn family_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(family_id): Path<i64>,
) -> AppResult<Json<FamilyStats>> {
    Ok(Json(state.dashboard.family_stats(&current.user, family_id).await?))
}
