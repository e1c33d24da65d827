//! Database layer
//!
//! SQLite through sqlx: pool management and schema creation.

pub mod connection;

pub use connection::DatabaseManager;
