//! Health check endpoint

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use crate::app::AppState;

pub fn create_health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness plus database reachability
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database_ok = state.db.ping().await;

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": if database_ok { "connected" } else { "unavailable" },
        "websocket_connections": state.hub.connection_count().await,
        "timestamp": state.time_provider.now_utc().to_rfc3339(),
    }))
}
