//! Error handling for the church office service
//!
//! Centralized error types and their HTTP mapping.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Authentication(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("{0}")]
    BadRequest(String),

    /// A prayer schedule batch overlaps itself or the persisted chain.
    #[error("{message}")]
    ScheduleConflict {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl AppError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                StatusCode::CONFLICT
            }
            AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::WebSocket(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::ScheduleConflict { .. } => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::Unauthorized | AppError::Authentication(_) | AppError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "NotFound",
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                "Conflict"
            }
            AppError::Database(_) => "DatabaseError",
            AppError::Authentication(_) => "AuthenticationError",
            AppError::WebSocket(_) => "WebSocketError",
            AppError::Validation(_) => "ValidationError",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "InternalError",
            AppError::BadRequest(_) => "BadRequest",
            AppError::ScheduleConflict { .. } => "ScheduleConflict",
            AppError::Conflict(_) => "Conflict",
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Serialization(_) => "SerializationError",
            AppError::Io(_) => "IoError",
            AppError::Token(_) => "InvalidToken",
            AppError::Multipart(_) => "InvalidUpload",
        }
    }

    /// Check if this error should be logged as an error vs warning
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message exposed to clients. Server-side failures are not echoed back verbatim.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                "Record already exists".to_string()
            }
            AppError::Database(_) | AppError::Io(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            crate::logging::log_error_with_context(&self.to_string(), error_code);
        } else {
            tracing::warn!(error = %self, code = error_code, status = status.as_u16(), "Request rejected");
        }

        let mut body = json!({
            "error": error_code,
            "message": self.public_message(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let AppError::ScheduleConflict { details, .. } = &self {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn authentication_failed(message: &str) -> Self {
        AppError::Authentication(message.to_string())
    }

    pub fn websocket_error(message: &str) -> Self {
        AppError::WebSocket(message.to_string())
    }

    pub fn validation_error(message: &str) -> Self {
        AppError::Validation(message.to_string())
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{} not found", resource))
    }

    pub fn bad_request(message: &str) -> Self {
        AppError::BadRequest(message.to_string())
    }

    pub fn conflict(message: &str) -> Self {
        AppError::Conflict(message.to_string())
    }

    pub fn forbidden(message: &str) -> Self {
        AppError::Forbidden(message.to_string())
    }

    pub fn access_denied() -> Self {
        AppError::Forbidden("Access denied".to_string())
    }

    pub fn internal_error(message: &str) -> Self {
        AppError::Internal(message.to_string())
    }

    /// Build a schedule conflict whose message carries the first diagnostic.
    pub fn schedule_conflict(prefix: &str, details: Vec<String>) -> Self {
        let message = match details.first() {
            Some(first) => format!("{}: {}", prefix, first),
            None => prefix.to_string(),
        };
        AppError::ScheduleConflict { message, details }
    }
}
