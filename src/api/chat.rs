//! Chat room and message endpoints
//!
//! Writes go through `ChatService`, which also fans events out to
//! connected sockets.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::json;

use crate::api::extractors::CurrentUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::chat::{
    AddMemberRequest, ChatRoomDetail, ChatRoomMember, ChatRoomResponse, CreateChatRoomRequest,
    EditMessageRequest, MarkReadRequest, Message, PageQuery, SendMessageRequest,
    UpdateChatRoomRequest,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const ROOMS: &str = "chat_rooms";
const MEMBERS: &str = "chat_room_members";
const MESSAGES: &str = "messages";

pub fn create_chat_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room).put(update_room).delete(delete_room))
        .route("/rooms/:id/messages", get(list_messages).post(send_message))
        .route("/rooms/:id/read", post(mark_read))
        .route("/rooms/:id/members", post(add_member))
        .route("/rooms/:id/members/:user_id", delete(remove_member))
        .route("/messages/:id", put(edit_message).delete(delete_message))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<ChatRoomResponse>>> {
    Ok(Json(state.chat.list_rooms(&current.user, page).await?))
}

pub async fn create_room(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreateChatRoomRequest>,
) -> AppResult<(StatusCode, Json<ChatRoomDetail>)> {
    let room = state.chat.create_room(&current.user, request).await?;

    let entry = AuditEntry::new(AuditAction::Create, ROOMS, "Created chat room")
        .record(room.room.id)
        .details(json!({
            "name": room.room.name,
            "room_type": room.room.room_type,
            "members": room.members.len(),
        }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
) -> AppResult<Json<ChatRoomDetail>> {
    Ok(Json(state.chat.get_room(&current.user, room_id).await?))
}

pub async fn update_room(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
    Json(request): Json<UpdateChatRoomRequest>,
) -> AppResult<Json<ChatRoomDetail>> {
    let room = state.chat.update_room(&current.user, room_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Update, ROOMS, "Updated chat room")
        .record(room_id)
        .details(json!({ "name": room.room.name, "max_members": room.room.max_members }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(room))
}

pub async fn delete_room(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
) -> AppResult<StatusCode> {
    let room = state.chat.delete_room(&current.user, room_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, ROOMS, "Closed chat room")
        .record(room_id)
        .details(json!({ "name": room.name }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
    Json(request): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<ChatRoomMember>)> {
    let member = state.chat.add_member(&current.user, room_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Create, MEMBERS, "Added chat room member")
        .record(member.id)
        .details(json!({ "room_id": room_id, "user_id": member.user_id, "role": member.role }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((room_id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.chat.remove_member(&current.user, room_id, user_id).await?;

    let description = if user_id == current.user.id {
        "Left chat room"
    } else {
        "Removed chat room member"
    };
    let entry = AuditEntry::new(AuditAction::Delete, MEMBERS, description)
        .record(room_id)
        .details(json!({ "room_id": room_id, "user_id": user_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(state.chat.list_messages(&current.user, room_id, page).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = state.chat.send_message(&current.user, room_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Create, MESSAGES, "Sent chat message")
        .record(message.id)
        .details(json!({ "room_id": room_id, "message_type": message.message_type }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(message_id): Path<i64>,
    Json(request): Json<EditMessageRequest>,
) -> AppResult<Json<Message>> {
    let message = state.chat.edit_message(&current.user, message_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Update, MESSAGES, "Edited chat message")
        .record(message.id)
        .details(json!({ "room_id": message.chat_room_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(message_id): Path<i64>,
) -> AppResult<StatusCode> {
    let message = state.chat.delete_message(&current.user, message_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, MESSAGES, "Deleted chat message")
        .record(message.id)
        .details(json!({ "room_id": message.chat_room_id }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Advance the caller's read marker
pub async fn mark_read(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(room_id): Path<i64>,
    Json(request): Json<MarkReadRequest>,
) -> AppResult<Json<ChatRoomMember>> {
    Ok(Json(state.chat.mark_read(&current.user, room_id, request.message_id).await?))
}
