//! WebSocket message types
//!
//! JSON frames tagged by `type`, in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::Message;

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { room_id: i64 },
    LeaveRoom { room_id: i64 },
    Typing { room_id: i64, is_typing: bool },
    Ping,
}

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        connection_id: String,
        user_id: i64,
        online_users: Vec<i64>,
    },
    NewMessage {
        room_id: i64,
        message: Message,
    },
    MessageEdited {
        room_id: i64,
        message: Message,
    },
    MessageDeleted {
        room_id: i64,
        message_id: i64,
    },
    UserJoinedRoom {
        room_id: i64,
        user_id: i64,
    },
    UserLeftRoom {
        room_id: i64,
        user_id: i64,
    },
    TypingIndicator {
        room_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    PresenceUpdate {
        user_id: i64,
        is_online: bool,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name, used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::MessageEdited { .. } => "message_edited",
            ServerEvent::MessageDeleted { .. } => "message_deleted",
            ServerEvent::UserJoinedRoom { .. } => "user_joined_room",
            ServerEvent::UserLeftRoom { .. } => "user_left_room",
            ServerEvent::TypingIndicator { .. } => "typing_indicator",
            ServerEvent::PresenceUpdate { .. } => "presence_update",
            ServerEvent::Pong { .. } => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::LeaveRoom { .. } => "leave_room",
            ClientMessage::Typing { .. } => "typing",
            ClientMessage::Ping => "ping",
        }
    }
}
