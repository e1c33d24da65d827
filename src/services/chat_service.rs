//! Chat Service
//!
//! Rooms, memberships and messages. Writes go to the database first, then
//! the resulting event is pushed to online room members through the hub.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use sqlx::{query, query_as, query_scalar, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::chat::{
    AddMemberRequest, ChatRole, ChatRoom, ChatRoomDetail, ChatRoomMember, ChatRoomResponse, ChatRoomType,
    CreateChatRoomRequest, EditMessageRequest, Message, MessageType, PageQuery, SendMessageRequest,
    UpdateChatRoomRequest,
};
use crate::models::user::User;
use crate::services::time_provider::TimeProvider;
use crate::services::user_service::fetch_user;
use crate::services::websocket_service::ChatHub;
use crate::websocket::messages::ServerEvent;

const DEFAULT_MAX_MEMBERS: i64 = 100;
const MAX_RETENTION_DAYS: i64 = 36_500;

fn check_retention(days: i64) -> AppResult<i64> {
    if !(0..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(AppError::validation_error(&format!(
            "Message retention must be between 0 and {} days",
            MAX_RETENTION_DAYS
        )));
    }
    Ok(days)
}

/// Permission flags granted with a chat role:
/// (can_add_members, can_remove_members, can_edit_room)
fn role_permissions(role: ChatRole) -> (bool, bool, bool) {
    match role {
        ChatRole::Owner | ChatRole::Admin => (true, true, true),
        ChatRole::Moderator => (true, true, false),
        ChatRole::Member => (false, false, false),
    }
}

#[derive(Clone)]
pub struct ChatService {
    pool: SqlitePool,
    hub: Arc<ChatHub>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ChatService {
    pub fn new(pool: SqlitePool, hub: Arc<ChatHub>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            hub,
            time_provider,
        }
    }

    pub fn hub(&self) -> &Arc<ChatHub> {
        &self.hub
    }

    /// Create a room owned by `creator`. Listed users join as plain members.
    pub async fn create_room(&self, creator: &User, request: CreateChatRoomRequest) -> AppResult<ChatRoomDetail> {
        let member_ids: BTreeSet<i64> = request
            .member_ids
            .iter()
            .copied()
            .filter(|id| *id != creator.id)
            .collect();

        if request.room_type == ChatRoomType::Direct && member_ids.len() != 1 {
            return Err(AppError::validation_error(
                "A direct chat needs exactly one other member",
            ));
        }

        let max_members = request.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        if max_members < 2 {
            return Err(AppError::validation_error("A room must allow at least 2 members"));
        }
        if member_ids.len() as i64 + 1 > max_members {
            return Err(AppError::bad_request("Too many members for this room"));
        }
        let retention = check_retention(request.message_retention_days.unwrap_or(0))?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        if request.room_type != ChatRoomType::Direct && name.is_none() {
            return Err(AppError::validation_error("Room name is required"));
        }

        let now = self.time_provider.now_utc();
        let mut tx = self.pool.begin().await?;

        for member_id in &member_ids {
            fetch_user(&mut tx, *member_id).await?;
        }

        let room_id = query(
            "INSERT INTO chat_rooms (name, description, room_type, is_active, max_members,
                                     message_retention_days, created_by, created_at, updated_at, last_activity)
             VALUES (?, ?, ?, TRUE, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&request.description)
        .bind(request.room_type)
        .bind(max_members)
        .bind(retention)
        .bind(creator.id)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_member(&mut tx, room_id, creator.id, ChatRole::Owner, now).await?;
        for member_id in &member_ids {
            insert_member(&mut tx, room_id, *member_id, ChatRole::Member, now).await?;
        }

        let detail = load_detail(&mut tx, room_id).await?;
        tx.commit().await?;

        info!(room_id, creator = creator.id, members = detail.members.len(), "Chat room created");
        Ok(detail)
    }

    /// Active rooms the user belongs to, most recently active first
    pub async fn list_rooms(&self, user: &User, page: PageQuery) -> AppResult<Vec<ChatRoomResponse>> {
        let mut conn = self.pool.acquire().await?;
        let rooms: Vec<ChatRoom> = query_as(
            "SELECT r.* FROM chat_rooms r
             JOIN chat_room_members m ON m.chat_room_id = r.id
             WHERE m.user_id = ? AND m.is_blocked = FALSE AND r.is_active = TRUE
             ORDER BY r.last_activity DESC, r.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user.id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let mut responses = Vec::with_capacity(rooms.len());
        for room in rooms {
            responses.push(room_summary(&mut conn, room, user.id).await?);
        }
        Ok(responses)
    }

    pub async fn get_room(&self, user: &User, room_id: i64) -> AppResult<ChatRoomDetail> {
        let mut conn = self.pool.acquire().await?;
        require_member(&mut conn, room_id, user.id).await?;
        load_detail(&mut conn, room_id).await
    }

    pub async fn update_room(
        &self,
        user: &User,
        room_id: i64,
        request: UpdateChatRoomRequest,
    ) -> AppResult<ChatRoomDetail> {
        let mut conn = self.pool.acquire().await?;
        let membership = require_member(&mut conn, room_id, user.id).await?;
        if !membership.can_edit_room {
            return Err(AppError::forbidden("Permission denied to edit this room"));
        }
        let room = fetch_room(&mut conn, room_id).await?;

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::validation_error("Room name cannot be empty")),
            Some(name) => Some(name.to_string()),
            None => room.name,
        };
        let max_members = request.max_members.unwrap_or(room.max_members);
        let member_count = count_members(&mut conn, room_id).await?;
        if max_members < member_count {
            return Err(AppError::bad_request("Room already has more members than that"));
        }
        let retention = check_retention(request.message_retention_days.unwrap_or(room.message_retention_days))?;

        query(
            "UPDATE chat_rooms SET name = ?, description = ?, max_members = ?, message_retention_days = ?,
                                   updated_at = ?
             WHERE id = ?",
        )
        .bind(&name)
        .bind(request.description.or(room.description))
        .bind(max_members)
        .bind(retention)
        .bind(self.time_provider.now_utc())
        .bind(room_id)
        .execute(&mut *conn)
        .await?;

        load_detail(&mut conn, room_id).await
    }

    /// Soft delete; the room disappears from listings
    pub async fn delete_room(&self, user: &User, room_id: i64) -> AppResult<ChatRoom> {
        let mut conn = self.pool.acquire().await?;
        let membership = require_member(&mut conn, room_id, user.id).await?;
        if !membership.role.can_moderate() {
            return Err(AppError::forbidden("Permission denied to delete this room"));
        }

        query("UPDATE chat_rooms SET is_active = FALSE, updated_at = ? WHERE id = ?")
            .bind(self.time_provider.now_utc())
            .bind(room_id)
            .execute(&mut *conn)
            .await?;

        info!(room_id, deleted_by = user.id, "Chat room deleted");
        query_as("SELECT * FROM chat_rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn add_member(&self, actor: &User, room_id: i64, request: AddMemberRequest) -> AppResult<ChatRoomMember> {
        let mut tx = self.pool.begin().await?;
        let membership = require_member(&mut tx, room_id, actor.id).await?;
        if !membership.can_add_members {
            return Err(AppError::forbidden("Permission denied to add members"));
        }

        let room = fetch_room(&mut tx, room_id).await?;
        if room.room_type == ChatRoomType::Direct {
            return Err(AppError::bad_request("Members cannot be added to a direct chat"));
        }
        fetch_user(&mut tx, request.user_id).await?;
        if fetch_membership(&mut tx, room_id, request.user_id).await?.is_some() {
            return Err(AppError::conflict("User is already a member"));
        }
        if count_members(&mut tx, room_id).await? >= room.max_members {
            return Err(AppError::bad_request("Room is full"));
        }

        let role = match request.role.unwrap_or(ChatRole::Member) {
            ChatRole::Owner => return Err(AppError::validation_error("A room has only one owner")),
            role => role,
        };
        let now = self.time_provider.now_utc();
        insert_member(&mut tx, room_id, request.user_id, role, now).await?;
        let member = fetch_membership(&mut tx, room_id, request.user_id)
            .await?
            .ok_or_else(|| AppError::internal_error("Membership missing after insert"))?;
        tx.commit().await?;

        let mut conn = self.pool.acquire().await?;
        self.notify_members(
            &mut conn,
            room_id,
            &ServerEvent::UserJoinedRoom {
                room_id,
                user_id: request.user_id,
            },
        )
        .await?;
        Ok(member)
    }

    /// Remove a member. Anyone may leave; removing others needs the permission.
    pub async fn remove_member(&self, actor: &User, room_id: i64, user_id: i64) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        if actor.id != user_id {
            let membership = require_member(&mut conn, room_id, actor.id).await?;
            if !membership.can_remove_members {
                return Err(AppError::forbidden("Permission denied to remove members"));
            }
        }

        let target = fetch_membership(&mut conn, room_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Member"))?;
        if target.role == ChatRole::Owner && actor.id != user_id {
            return Err(AppError::forbidden("The room owner cannot be removed"));
        }

        query("DELETE FROM chat_room_members WHERE chat_room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let event = ServerEvent::UserLeftRoom { room_id, user_id };
        self.notify_members(&mut conn, room_id, &event).await?;
        self.hub.send_to_user(user_id, &event).await;
        Ok(())
    }

    pub async fn send_message(&self, sender: &User, room_id: i64, request: SendMessageRequest) -> AppResult<Message> {
        let mut conn = self.pool.acquire().await?;
        let membership = require_member(&mut conn, room_id, sender.id).await?;
        if !membership.can_send_messages {
            return Err(AppError::forbidden("You cannot send messages in this room"));
        }

        let content = request.content.map(|content| content.trim().to_string());
        if request.message_type == MessageType::Text && content.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::validation_error("Message content is required"));
        }

        let reply_to = match request.reply_to_message_id.filter(|id| *id > 0) {
            Some(reply_id) => {
                query_scalar::<_, i64>(
                    "SELECT id FROM messages WHERE id = ? AND chat_room_id = ? AND is_deleted = FALSE",
                )
                .bind(reply_id)
                .bind(room_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        let now = self.time_provider.now_utc();
        let message_id = query(
            "INSERT INTO messages (chat_room_id, sender_id, content, message_type, reply_to_message_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(sender.id)
        .bind(&content)
        .bind(request.message_type)
        .bind(reply_to)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        query("UPDATE chat_rooms SET last_activity = ? WHERE id = ?")
            .bind(now)
            .bind(room_id)
            .execute(&mut *conn)
            .await?;
        query("UPDATE chat_room_members SET last_read_message_id = ? WHERE chat_room_id = ? AND user_id = ?")
            .bind(message_id)
            .bind(room_id)
            .bind(sender.id)
            .execute(&mut *conn)
            .await?;

        let message = fetch_message(&mut conn, message_id).await?;
        self.notify_members(
            &mut conn,
            room_id,
            &ServerEvent::NewMessage {
                room_id,
                message: message.clone(),
            },
        )
        .await?;

        debug!(room_id, message_id, sender = sender.id, "Message sent");
        Ok(message)
    }

    /// Page 1 holds the newest `size` messages, returned oldest first
    pub async fn list_messages(&self, user: &User, room_id: i64, page: PageQuery) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.acquire().await?;
        require_member(&mut conn, room_id, user.id).await?;

        let mut messages: Vec<Message> = query_as(
            "SELECT * FROM messages WHERE chat_room_id = ? ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(room_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;
        messages.reverse();

        Ok(messages.into_iter().map(Message::redacted).collect())
    }

    pub async fn edit_message(&self, user: &User, message_id: i64, request: EditMessageRequest) -> AppResult<Message> {
        let mut conn = self.pool.acquire().await?;
        let message = fetch_message(&mut conn, message_id).await?;
        require_member(&mut conn, message.chat_room_id, user.id).await?;

        if message.sender_id != user.id {
            return Err(AppError::forbidden("Only the sender can edit this message"));
        }
        if message.is_deleted {
            return Err(AppError::bad_request("Cannot edit a deleted message"));
        }
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::validation_error("Message content is required"));
        }

        query("UPDATE messages SET content = ?, is_edited = TRUE, edited_at = ? WHERE id = ?")
            .bind(content)
            .bind(self.time_provider.now_utc())
            .bind(message_id)
            .execute(&mut *conn)
            .await?;

        let edited = fetch_message(&mut conn, message_id).await?;
        self.notify_members(
            &mut conn,
            edited.chat_room_id,
            &ServerEvent::MessageEdited {
                room_id: edited.chat_room_id,
                message: edited.clone(),
            },
        )
        .await?;
        Ok(edited)
    }

    /// Soft delete by the sender or a room moderator
    pub async fn delete_message(&self, user: &User, message_id: i64) -> AppResult<Message> {
        let mut conn = self.pool.acquire().await?;
        let message = fetch_message(&mut conn, message_id).await?;
        let membership = require_member(&mut conn, message.chat_room_id, user.id).await?;

        if message.sender_id != user.id && !membership.role.can_moderate() {
            return Err(AppError::forbidden("Permission denied to delete this message"));
        }
        if message.is_deleted {
            return Ok(message.redacted());
        }

        query("UPDATE messages SET is_deleted = TRUE, deleted_at = ? WHERE id = ?")
            .bind(self.time_provider.now_utc())
            .bind(message_id)
            .execute(&mut *conn)
            .await?;

        let room_id = message.chat_room_id;
        self.notify_members(&mut conn, room_id, &ServerEvent::MessageDeleted { room_id, message_id })
            .await?;
        Ok(fetch_message(&mut conn, message_id).await?.redacted())
    }

    pub async fn mark_read(&self, user: &User, room_id: i64, message_id: i64) -> AppResult<ChatRoomMember> {
        let mut conn = self.pool.acquire().await?;
        let membership = require_member(&mut conn, room_id, user.id).await?;

        let message = fetch_message(&mut conn, message_id).await?;
        if message.chat_room_id != room_id {
            return Err(AppError::bad_request("Message does not belong to this room"));
        }

        // Never move the read marker backwards
        let marker = membership.last_read_message_id.map_or(message_id, |current| current.max(message_id));
        query("UPDATE chat_room_members SET last_read_message_id = ? WHERE id = ?")
            .bind(marker)
            .bind(membership.id)
            .execute(&mut *conn)
            .await?;

        fetch_membership(&mut conn, room_id, user.id)
            .await?
            .ok_or_else(|| AppError::not_found("Member"))
    }

    /// Whether `user_id` is an unblocked member of an active room
    pub async fn is_member(&self, room_id: i64, user_id: i64) -> AppResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(require_member(&mut conn, room_id, user_id).await.is_ok())
    }

    /// Delete messages past each room's retention window
    pub async fn purge_expired_messages(&self) -> AppResult<u64> {
        let now = self.time_provider.now_utc();
        let mut conn = self.pool.acquire().await?;
        let rooms: Vec<(i64, i64)> = query_as(
            "SELECT id, message_retention_days FROM chat_rooms WHERE message_retention_days > 0",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut removed = 0;
        for (room_id, days) in rooms {
            let Some(cutoff) = Duration::try_days(days).and_then(|window| now.checked_sub_signed(window)) else {
                warn!(room_id, days, "Retention window out of range, skipping room");
                continue;
            };
            removed += query("DELETE FROM messages WHERE chat_room_id = ? AND created_at < ?")
                .bind(room_id)
                .bind(cutoff)
                .execute(&mut *conn)
                .await?
                .rows_affected();
        }
        Ok(removed)
    }

    async fn notify_members(&self, conn: &mut SqliteConnection, room_id: i64, event: &ServerEvent) -> AppResult<()> {
        let member_ids: Vec<i64> =
            query_scalar("SELECT user_id FROM chat_room_members WHERE chat_room_id = ? AND is_blocked = FALSE")
                .bind(room_id)
                .fetch_all(&mut *conn)
                .await?;
        let delivered = self.hub.send_to_users(&member_ids, event).await;
        debug!(room_id, event = event.event_type(), delivered, "Fanned out chat event");
        Ok(())
    }
}

async fn fetch_room(conn: &mut SqliteConnection, room_id: i64) -> AppResult<ChatRoom> {
    query_as("SELECT * FROM chat_rooms WHERE id = ? AND is_active = TRUE")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Room"))
}

async fn fetch_membership(
    conn: &mut SqliteConnection,
    room_id: i64,
    user_id: i64,
) -> AppResult<Option<ChatRoomMember>> {
    Ok(
        query_as("SELECT * FROM chat_room_members WHERE chat_room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?,
    )
}

/// The caller's membership of an active room, or 404/403
async fn require_member(conn: &mut SqliteConnection, room_id: i64, user_id: i64) -> AppResult<ChatRoomMember> {
    fetch_room(conn, room_id).await?;
    match fetch_membership(conn, room_id, user_id).await? {
        Some(member) if !member.is_blocked => Ok(member),
        _ => Err(AppError::forbidden("Access denied to this room")),
    }
}

async fn fetch_message(conn: &mut SqliteConnection, message_id: i64) -> AppResult<Message> {
    query_as("SELECT * FROM messages WHERE id = ?")
        .bind(message_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Message"))
}

async fn insert_member(
    conn: &mut SqliteConnection,
    room_id: i64,
    user_id: i64,
    role: ChatRole,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<()> {
    let (can_add, can_remove, can_edit) = role_permissions(role);
    query(
        "INSERT INTO chat_room_members (chat_room_id, user_id, role, can_send_messages, can_add_members,
                                        can_remove_members, can_edit_room, is_blocked, joined_at)
         VALUES (?, ?, ?, TRUE, ?, ?, ?, FALSE, ?)",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(role)
    .bind(can_add)
    .bind(can_remove)
    .bind(can_edit)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn count_members(conn: &mut SqliteConnection, room_id: i64) -> AppResult<i64> {
    Ok(query_scalar("SELECT COUNT(*) FROM chat_room_members WHERE chat_room_id = ?")
        .bind(room_id)
        .fetch_one(&mut *conn)
        .await?)
}

async fn load_detail(conn: &mut SqliteConnection, room_id: i64) -> AppResult<ChatRoomDetail> {
    let room = fetch_room(conn, room_id).await?;
    let members = query_as("SELECT * FROM chat_room_members WHERE chat_room_id = ? ORDER BY id")
        .bind(room_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ChatRoomDetail { room, members })
}

async fn room_summary(conn: &mut SqliteConnection, room: ChatRoom, user_id: i64) -> AppResult<ChatRoomResponse> {
    let member_count = count_members(conn, room.id).await?;

    let last_read =
        query_scalar::<_, Option<i64>>("SELECT last_read_message_id FROM chat_room_members WHERE chat_room_id = ? AND user_id = ?")
            .bind(room.id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?
            .flatten();

    let unread_count: i64 = query_scalar(
        "SELECT COUNT(*) FROM messages
         WHERE chat_room_id = ? AND id > ? AND sender_id != ? AND is_deleted = FALSE",
    )
    .bind(room.id)
    .bind(last_read.unwrap_or(0))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let last_message: Option<Message> =
        query_as("SELECT * FROM messages WHERE chat_room_id = ? ORDER BY id DESC LIMIT 1")
            .bind(room.id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(ChatRoomResponse {
        room,
        member_count,
        unread_count,
        last_message: last_message.map(Message::redacted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::services::time_provider::SystemTimeProvider;

    async fn setup() -> (ChatService, Vec<User>) {
        let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();

        let mut users = Vec::new();
        for (i, name) in ["Alice", "Bob", "Carol"].iter().enumerate() {
            query(
                "INSERT INTO users (full_name, email, phone, gender, role, hashed_password, is_active, created_at, updated_at)
                 VALUES (?, ?, '0788', 'Female', 'Other', 'x', TRUE, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            )
            .bind(*name)
            .bind(format!("user{}@example.com", i))
            .execute(&db.pool)
            .await
            .unwrap();
            let user: User = query_as("SELECT * FROM users WHERE id = last_insert_rowid()")
                .fetch_one(&db.pool)
                .await
                .unwrap();
            users.push(user);
        }

        let service = ChatService::new(db.pool, Arc::new(ChatHub::new(10)), Arc::new(SystemTimeProvider::new()));
        (service, users)
    }

    fn group(name: &str, member_ids: Vec<i64>) -> CreateChatRoomRequest {
        CreateChatRoomRequest {
            name: Some(name.to_string()),
            description: None,
            room_type: ChatRoomType::Group,
            member_ids,
            max_members: None,
            message_retention_days: None,
        }
    }

    fn text(content: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: Some(content.to_string()),
            message_type: MessageType::Text,
            reply_to_message_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_room_assigns_owner() {
        let (service, users) = setup().await;
        let detail = service
            .create_room(&users[0], group("Choir", vec![users[1].id, users[0].id]))
            .await
            .unwrap();

        assert_eq!(detail.members.len(), 2);
        let owner = detail.members.iter().find(|m| m.user_id == users[0].id).unwrap();
        assert_eq!(owner.role, ChatRole::Owner);
        assert!(owner.can_edit_room);
        let member = detail.members.iter().find(|m| m.user_id == users[1].id).unwrap();
        assert_eq!(member.role, ChatRole::Member);
        assert!(!member.can_add_members);
    }

    #[tokio::test]
    async fn test_direct_room_needs_one_other_member() {
        let (service, users) = setup().await;
        let mut request = group("", vec![users[1].id, users[2].id]);
        request.room_type = ChatRoomType::Direct;
        assert!(matches!(
            service.create_room(&users[0], request.clone()).await,
            Err(AppError::Validation(_))
        ));

        request.member_ids = vec![users[1].id];
        assert!(service.create_room(&users[0], request).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_member_is_denied() {
        let (service, users) = setup().await;
        let room = service.create_room(&users[0], group("Choir", vec![users[1].id])).await.unwrap();
        assert!(matches!(
            service.get_room(&users[2], room.room.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(!service.is_member(room.room.id, users[2].id).await.unwrap());
        assert!(service.is_member(room.room.id, users[1].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_message_flow_and_unread_counts() {
        let (service, users) = setup().await;
        let room_id = service
            .create_room(&users[0], group("Choir", vec![users[1].id]))
            .await
            .unwrap()
            .room
            .id;

        let first = service.send_message(&users[0], room_id, text("hello")).await.unwrap();
        service.send_message(&users[0], room_id, text("again")).await.unwrap();

        let rooms = service.list_rooms(&users[1], PageQuery::default()).await.unwrap();
        assert_eq!(rooms[0].unread_count, 2);
        assert_eq!(rooms[0].member_count, 2);
        assert_eq!(rooms[0].last_message.as_ref().unwrap().content.as_deref(), Some("again"));

        service.mark_read(&users[1], room_id, first.id).await.unwrap();
        let rooms = service.list_rooms(&users[1], PageQuery::default()).await.unwrap();
        assert_eq!(rooms[0].unread_count, 1);

        let empty = service.send_message(&users[0], room_id, text("   ")).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_message_pages_are_oldest_first() {
        let (service, users) = setup().await;
        let room_id = service.create_room(&users[0], group("Choir", vec![])).await.unwrap().room.id;
        for i in 1..=5 {
            service.send_message(&users[0], room_id, text(&format!("m{}", i))).await.unwrap();
        }

        let page = service
            .list_messages(&users[0], room_id, PageQuery { page: 1, size: 2 })
            .await
            .unwrap();
        let contents: Vec<_> = page.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m4", "m5"]);

        let page = service
            .list_messages(&users[0], room_id, PageQuery { page: 2, size: 2 })
            .await
            .unwrap();
        let contents: Vec<_> = page.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);

        let far = service
            .list_messages(&users[0], room_id, PageQuery { page: i64::MAX, size: 100 })
            .await
            .unwrap();
        assert!(far.is_empty());
    }

    #[tokio::test]
    async fn test_edit_and_delete_rules() {
        let (service, users) = setup().await;
        let room_id = service
            .create_room(&users[0], group("Choir", vec![users[1].id]))
            .await
            .unwrap()
            .room
            .id;
        let message = service.send_message(&users[1], room_id, text("draft")).await.unwrap();

        let denied = service
            .edit_message(&users[0], message.id, EditMessageRequest { content: "x".into() })
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let edited = service
            .edit_message(&users[1], message.id, EditMessageRequest { content: "final".into() })
            .await
            .unwrap();
        assert!(edited.is_edited);
        assert!(edited.edited_at.is_some());

        // owner moderates
        let deleted = service.delete_message(&users[0], message.id).await.unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(deleted.content.as_deref(), Some(""));

        let history = service.list_messages(&users[1], room_id, PageQuery::default()).await.unwrap();
        assert!(history[0].is_deleted);
    }

    #[tokio::test]
    async fn test_reply_outside_room_is_dropped() {
        let (service, users) = setup().await;
        let a = service.create_room(&users[0], group("A", vec![])).await.unwrap().room.id;
        let b = service.create_room(&users[0], group("B", vec![])).await.unwrap().room.id;
        let in_a = service.send_message(&users[0], a, text("one")).await.unwrap();

        let mut reply = text("two");
        reply.reply_to_message_id = Some(in_a.id);
        let sent = service.send_message(&users[0], b, reply).await.unwrap();
        assert_eq!(sent.reply_to_message_id, None);
    }

    #[tokio::test]
    async fn test_member_management() {
        let (service, users) = setup().await;
        let room_id = service.create_room(&users[0], group("Choir", vec![users[1].id])).await.unwrap().room.id;

        let request = AddMemberRequest {
            user_id: users[2].id,
            role: None,
        };
        let denied = service.add_member(&users[1], room_id, request.clone()).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        service.add_member(&users[0], room_id, request.clone()).await.unwrap();
        let duplicate = service.add_member(&users[0], room_id, request).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        // members may always leave
        service.remove_member(&users[2], room_id, users[2].id).await.unwrap();
        assert!(!service.is_member(room_id, users[2].id).await.unwrap());

        service.delete_room(&users[0], room_id).await.unwrap();
        assert!(service.list_rooms(&users[0], PageQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_is_bounded() {
        let (service, users) = setup().await;
        let mut request = group("Archive", vec![]);
        request.message_retention_days = Some(100_000_000);
        let rejected = service.create_room(&users[0], request).await;
        assert!(matches!(rejected, Err(AppError::Validation(_))));

        let room_id = service.create_room(&users[0], group("Choir", vec![])).await.unwrap().room.id;
        let update = UpdateChatRoomRequest {
            name: None,
            description: None,
            max_members: None,
            message_retention_days: Some(36_501),
        };
        let rejected = service.update_room(&users[0], room_id, update).await;
        assert!(matches!(rejected, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_purge_skips_out_of_range_retention() {
        let (service, users) = setup().await;
        let huge = service.create_room(&users[0], group("Archive", vec![])).await.unwrap().room.id;
        service.send_message(&users[0], huge, text("kept")).await.unwrap();
        // rows written before retention was bounded
        query("UPDATE chat_rooms SET message_retention_days = ? WHERE id = ?")
            .bind(100_000_000i64)
            .bind(huge)
            .execute(&service.pool)
            .await
            .unwrap();

        let mut request = group("Daily", vec![]);
        request.message_retention_days = Some(1);
        let daily = service.create_room(&users[0], request).await.unwrap().room.id;
        service.send_message(&users[0], daily, text("old")).await.unwrap();
        query("UPDATE messages SET created_at = ? WHERE chat_room_id = ?")
            .bind(service.time_provider.now_utc() - Duration::days(3))
            .bind(daily)
            .execute(&service.pool)
            .await
            .unwrap();

        assert_eq!(service.purge_expired_messages().await.unwrap(), 1);
        assert_eq!(service.list_messages(&users[0], huge, PageQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_message_reaches_online_members() {
        let (service, users) = setup().await;
        let room_id = service.create_room(&users[0], group("Choir", vec![users[1].id])).await.unwrap().room.id;
        let (_connection, mut receiver) = service.hub().register(users[1].id).await.unwrap();

        service.send_message(&users[0], room_id, text("hi")).await.unwrap();
        let event = receiver.try_recv().unwrap();
        assert!(matches!(event, ServerEvent::NewMessage { room_id: r, .. } if r == room_id));
    }
}
