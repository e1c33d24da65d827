//! WebSocket Module
//!
//! Chat wire protocol and the socket endpoint.

pub mod handler;
pub mod messages;

pub use handler::websocket_handler;
