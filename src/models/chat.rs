//! Chat Model
//!
//! Rooms, memberships with per-member permissions, and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRoomType {
    Direct,
    #[default]
    Group,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    Owner,
    Admin,
    Moderator,
    Member,
}

impl ChatRole {
    /// Owners, admins and moderators may delete the room and others' messages
    pub fn can_moderate(&self) -> bool {
        matches!(self, ChatRole::Owner | ChatRole::Admin | ChatRole::Moderator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    File,
    Location,
    Contact,
    Sticker,
    Gif,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatRoom {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub room_type: ChatRoomType,
    pub is_active: bool,
    pub max_members: i64,
    pub message_retention_days: i64,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatRoomMember {
    pub id: i64,
    pub chat_room_id: i64,
    pub user_id: i64,
    pub role: ChatRole,
    pub can_send_messages: bool,
    pub can_add_members: bool,
    pub can_remove_members: bool,
    pub can_edit_room: bool,
    pub is_blocked: bool,
    pub joined_at: DateTime<Utc>,
    pub last_read_message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_room_id: i64,
    pub sender_id: i64,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub reply_to_message_id: Option<i64>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Deleted messages keep their slot in history but lose their content
    pub fn redacted(mut self) -> Self {
        if self.is_deleted {
            self.content = Some(String::new());
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRoomResponse {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub member_count: i64,
    pub unread_count: i64,
    pub last_message: Option<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRoomDetail {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub members: Vec<ChatRoomMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatRoomRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub room_type: ChatRoomType,
    #[serde(default)]
    pub member_ids: Vec<i64>,
    pub max_members: Option<i64>,
    pub message_retention_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChatRoomRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_members: Option<i64>,
    pub message_retention_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    pub role: Option<ChatRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    pub reply_to_message_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkReadRequest {
    pub message_id: i64,
}

/// 1-based page query shared by room and message listings
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_page_size(),
        }
    }
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.size.clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}
