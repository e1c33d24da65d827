//! Services module for the church office
//!
//! Business logic: one service per resource, plus the chat hub,
//! the audit log and the maintenance scheduler.

pub mod activity_service;
pub mod announcement_service;
pub mod audit_service;
pub mod auth_service;
pub mod bcc_service;
pub mod chat_service;
pub mod checkin_service;
pub mod dashboard_service;
pub mod document_service;
pub mod family_service;
pub mod member_service;
pub mod prayer_chain_service;
pub mod schedule_checker;
pub mod scheduling_service;
pub mod shared_document_service;
pub mod storage_service;
pub mod time_provider;
pub mod user_service;
pub mod validation;
pub mod websocket_service;

// Re-export commonly used services
pub use prayer_chain_service::PrayerChainService;
pub use scheduling_service::MaintenanceScheduler;
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};
pub use websocket_service::ChatHub;
