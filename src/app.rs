//! Application wiring
//!
//! Builds every service once at startup and assembles the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::api;
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::error::{AppError, AppResult};
use crate::services::activity_service::ActivityService;
use crate::services::announcement_service::AnnouncementService;
use crate::services::audit_service::AuditService;
use crate::services::auth_service::{AuthService, PasswordHasher, TokenService};
use crate::services::bcc_service::BccService;
use crate::services::chat_service::ChatService;
use crate::services::checkin_service::CheckinService;
use crate::services::dashboard_service::DashboardService;
use crate::services::document_service::DocumentService;
use crate::services::family_service::FamilyService;
use crate::services::member_service::MemberService;
use crate::services::prayer_chain_service::PrayerChainService;
use crate::services::shared_document_service::SharedDocumentService;
use crate::services::storage_service::StorageService;
use crate::services::time_provider::TimeProvider;
use crate::services::user_service::UserService;
use crate::services::websocket_service::ChatHub;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseManager,
    pub time_provider: Arc<dyn TimeProvider>,
    pub hub: Arc<ChatHub>,
    pub auth: AuthService,
    pub users: UserService,
    pub families: FamilyService,
    pub members: MemberService,
    pub bcc: BccService,
    pub activities: ActivityService,
    pub checkins: CheckinService,
    pub announcements: AnnouncementService,
    pub documents: DocumentService,
    pub shared_documents: SharedDocumentService,
    pub prayer_chains: PrayerChainService,
    pub chat: ChatService,
    pub dashboard: DashboardService,
    pub audit: AuditService,
}

impl AppState {
    /// Connect, migrate and build the services. Creates the bootstrap
    /// admin when credentials are configured.
    pub async fn initialize(config: Config, time_provider: Arc<dyn TimeProvider>) -> AppResult<Self> {
        let timezone = config
            .parsed_timezone()
            .map_err(|e| AppError::internal_error(&e.to_string()))?;

        let db = DatabaseManager::connect(&config.database_url).await?;
        db.migrate().await?;
        let pool = db.pool.clone();

        let hasher = PasswordHasher::new(config.password_hash_iterations);
        let tokens = TokenService::new(&config.jwt_secret, config.access_token_expire_minutes);
        let storage = StorageService::new(&config.upload_dir, config.max_upload_bytes);
        let hub = Arc::new(ChatHub::new(config.max_websocket_connections));

        let state = Self {
            auth: AuthService::new(pool.clone(), hasher, tokens),
            users: UserService::new(pool.clone(), hasher, time_provider.clone()),
            families: FamilyService::new(pool.clone(), time_provider.clone()),
            members: MemberService::new(pool.clone(), time_provider.clone(), timezone),
            bcc: BccService::new(pool.clone(), time_provider.clone()),
            activities: ActivityService::new(pool.clone(), time_provider.clone()),
            checkins: CheckinService::new(pool.clone(), time_provider.clone(), &config.frontend_url),
            announcements: AnnouncementService::new(pool.clone(), storage.clone(), time_provider.clone()),
            documents: DocumentService::new(pool.clone(), storage.clone(), time_provider.clone()),
            shared_documents: SharedDocumentService::new(pool.clone(), storage, time_provider.clone()),
            prayer_chains: PrayerChainService::new(pool.clone(), time_provider.clone()),
            chat: ChatService::new(pool.clone(), hub.clone(), time_provider.clone()),
            dashboard: DashboardService::new(pool.clone(), time_provider.clone(), timezone),
            audit: AuditService::new(pool, time_provider.clone()),
            config: Arc::new(config),
            db,
            time_provider,
            hub,
        };

        if let (Some(email), Some(password)) = (&state.config.admin_email, &state.config.admin_password) {
            if state.users.ensure_admin(email, password).await? {
                info!(email = %email, "Bootstrap admin account created");
            }
        }

        Ok(state)
    }
}

/// The full application router
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    let timeout = Duration::from_secs(state.config.request_timeout);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api", api::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    crate::request_span!(request.method(), request.uri().path())
                }))
                .layer(TimeoutLayer::new(timeout))
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Explicit origins, or any origin when the list is empty or holds `*`
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
