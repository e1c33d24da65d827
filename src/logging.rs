//! Logging configuration for the church office service
//!
//! Structured logging setup with appropriate levels and formatting.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Initialize the application logging system.
///
/// `RUST_LOG` wins over `level`. JSON output is used when `json` is set,
/// compact console output otherwise. Calling this twice is harmless.
pub fn init_logging(level: &str, json: bool) {
    let default_filter = format!(
        "church_office={level},tower_http={level},axum::rejection=trace,sqlx=warn",
        level = level
    );

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_ansi(true)
    });

    let initialized = Registry::default()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!("Logging system initialized");
    }
}

/// Create a span for request logging
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            status_code = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    };
}

/// Create a span for a chat WebSocket connection
#[macro_export]
macro_rules! websocket_span {
    ($connection_id:expr, $user_id:expr) => {
        tracing::info_span!(
            "websocket_connection",
            connection_id = %$connection_id,
            user_id = %$user_id,
            rooms_joined = tracing::field::Empty,
        )
    };
}

/// Create a span for database operations
#[macro_export]
macro_rules! db_span {
    ($operation:expr, $table:expr) => {
        tracing::debug_span!(
            "database_operation",
            operation = %$operation,
            table = %$table,
            rows_affected = tracing::field::Empty,
        )
    };
}

/// Log application startup
pub fn log_startup(bind_address: &str, environment: &str) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %bind_address,
        environment = %environment,
        "Church office service starting up"
    );
}

/// Log WebSocket connection established or closed
pub fn log_websocket_connection(connection_id: &str, user_id: i64, connected: bool) {
    if connected {
        tracing::info!(connection_id = %connection_id, user_id, "WebSocket connection established");
    } else {
        tracing::info!(connection_id = %connection_id, user_id, "WebSocket connection closed");
    }
}

/// Log WebSocket message received
pub fn log_websocket_message_received(connection_id: &str, message_type: &str) {
    tracing::debug!(
        connection_id = %connection_id,
        message_type = %message_type,
        "WebSocket message received"
    );
}

/// Log a rejected prayer schedule batch
pub fn log_schedule_collision(prayer_chain_id: Option<i64>, family_id: Option<i64>, details: &[String]) {
    tracing::warn!(
        prayer_chain_id = ?prayer_chain_id,
        family_id = ?family_id,
        collisions = details.len(),
        first = details.first().map(String::as_str).unwrap_or(""),
        "Prayer schedule collision detected"
    );
}

/// Log authentication event
pub fn log_auth_event(event: &str, email: Option<&str>, success: bool) {
    if success {
        tracing::info!(event = %event, email = ?email, "Authentication successful");
    } else {
        tracing::warn!(event = %event, email = ?email, "Authentication failed");
    }
}

/// Log a maintenance job run
pub fn log_maintenance_run(job: &str, rows_removed: u64, success: bool) {
    if success {
        tracing::info!(job = %job, rows_removed, "Maintenance job completed");
    } else {
        tracing::error!(job = %job, "Maintenance job failed");
    }
}

/// Log error with context
pub fn log_error_with_context(error: &str, context: &str) {
    tracing::error!(error = %error, context = %context, "Application error occurred");
}
