//! Authentication endpoints

use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::json;

use crate::api::extractors::Client;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::system_log::AuditAction;
use crate::models::user::{LoginRequest, TokenResponse};
use crate::services::audit_service::AuditEntry;

pub fn create_auth_routes() -> Router<AppState> {
    Router::new().route("/token", post(login))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let response = state.auth.login(&request.email, &request.password).await?;

    let entry = AuditEntry::new(AuditAction::Login, "users", "User logged in")
        .record(response.user.id)
        .details(json!({ "email": response.user.email }));
    state.audit.record(&response.user, &client, entry).await;

    Ok(Json(response))
}
