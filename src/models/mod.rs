//! Models module for the church office
//!
//! Row types, enums and request/response shapes for every resource.

pub mod activity;
pub mod announcement;
pub mod bcc;
pub mod chat;
pub mod checkin;
pub mod dashboard;
pub mod document;
pub mod family;
pub mod family_member;
pub mod prayer_chain;
pub mod shared_document;
pub mod system_log;
pub mod user;

// Re-export commonly used types
pub use family::Family;
pub use prayer_chain::{CollisionReport, PersistedSlot, ScheduleSlot, Weekday};
pub use user::{FamilyCategory, Gender, Role, User};
