//! Church office backend
//!
//! Families, members, the BCC program, activities, announcements,
//! documents, collision-checked prayer chains and real-time chat.

pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod websocket;

pub use app::{build_app, AppState};
pub use config::Config;
pub use error::{AppError, AppResult};
