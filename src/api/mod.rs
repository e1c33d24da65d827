//! API module for the church office
//!
//! REST endpoints and routing. Every resource module exposes a
//! `create_*_routes` function that is nested under `/api`.

pub mod activities;
pub mod announcements;
pub mod auth;
pub mod bcc;
pub mod chat;
pub mod checkins;
pub mod dashboard;
pub mod documents;
pub mod extractors;
pub mod families;
pub mod health;
pub mod members;
pub mod prayer_chains;
pub mod public;
pub mod shared_documents;
pub mod system_logs;
pub mod uploads;
pub mod users;

use axum::{routing::get, Router};

use crate::app::AppState;
use crate::websocket::websocket_handler;

pub use extractors::{AdminUser, CurrentUser, PastorUser};

/// Every route below `/api`
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::create_health_routes())
        .route("/ws", get(websocket_handler))
        .nest("/auth", auth::create_auth_routes())
        .nest("/users", users::create_user_routes())
        .nest("/families", families::create_family_routes())
        .nest("/family-members", members::create_member_routes())
        .nest("/bcc", bcc::create_bcc_routes())
        .nest(
            "/activities",
            activities::create_activity_routes().merge(checkins::create_checkin_routes()),
        )
        .nest("/announcements", announcements::create_announcement_routes())
        .nest("/documents", documents::create_document_routes())
        .nest("/shared-documents", shared_documents::create_shared_document_routes())
        .nest("/prayer-chains", prayer_chains::create_prayer_chain_routes())
        .nest("/chat", chat::create_chat_routes())
        .nest("/dashboard", dashboard::create_dashboard_routes())
        .nest("/system-logs", system_logs::create_system_log_routes())
        .nest("/public", public::create_public_routes())
}
