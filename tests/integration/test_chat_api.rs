//! Chat rooms and messages over HTTP

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{authorized, TestApp};

#[tokio::test]
async fn test_room_message_flow() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;

    let response = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "name": "Choir", "member_ids": [zion.id] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    let room: Value = response.json();
    assert_eq!(room["room_type"], "group");
    assert_eq!(room["members"].as_array().unwrap().len(), 2);
    assert_eq!(room["members"][0]["role"], "owner");
    let room_id = room["id"].as_i64().unwrap();

    let response = authorized(
        app.server.post(&format!("/api/chat/rooms/{}/messages", room_id)),
        &bethel.token,
    )
    .json(&json!({ "content": "  Rehearsal at six  " }))
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let message: Value = response.json();
    assert_eq!(message["content"], "Rehearsal at six");
    assert_eq!(message["message_type"], "text");

    // The recipient has one unread message, the sender none
    let rooms: Value = authorized(app.server.get("/api/chat/rooms"), &zion.token)
        .await
        .json();
    assert_eq!(rooms[0]["unread_count"], 1);
    assert_eq!(rooms[0]["last_message"]["id"], message["id"]);
    let rooms: Value = authorized(app.server.get("/api/chat/rooms"), &bethel.token)
        .await
        .json();
    assert_eq!(rooms[0]["unread_count"], 0);

    let response = authorized(
        app.server.post(&format!("/api/chat/rooms/{}/read", room_id)),
        &zion.token,
    )
    .json(&json!({ "message_id": message["id"] }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let rooms: Value = authorized(app.server.get("/api/chat/rooms"), &zion.token)
        .await
        .json();
    assert_eq!(rooms[0]["unread_count"], 0);

    let messages: Value = authorized(
        app.server.get(&format!("/api/chat/rooms/{}/messages", room_id)),
        &zion.token,
    )
    .await
    .json();
    assert_eq!(messages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_and_delete_permissions() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;

    let room: Value = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "name": "Elders", "member_ids": [zion.id] }))
        .await
        .json();
    let room_id = room["id"].as_i64().unwrap();

    let message: Value = authorized(
        app.server.post(&format!("/api/chat/rooms/{}/messages", room_id)),
        &zion.token,
    )
    .json(&json!({ "content": "Hello" }))
    .await
    .json();
    let message_id = message["id"].as_i64().unwrap();

    // Only the sender edits
    let response = authorized(app.server.put(&format!("/api/chat/messages/{}", message_id)), &bethel.token)
        .json(&json!({ "content": "Changed" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.put(&format!("/api/chat/messages/{}", message_id)), &zion.token)
        .json(&json!({ "content": "Hello all" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let edited: Value = response.json();
    assert_eq!(edited["is_edited"], true);

    // The owner moderates others' messages
    let response = authorized(app.server.delete(&format!("/api/chat/messages/{}", message_id)), &bethel.token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let messages: Value = authorized(
        app.server.get(&format!("/api/chat/rooms/{}/messages", room_id)),
        &zion.token,
    )
    .await
    .json();
    assert_eq!(messages[0]["is_deleted"], true);
    assert_eq!(messages[0]["content"], "");

    // A plain member cannot remove the owner or delete the room
    let response = authorized(
        app.server.delete(&format!("/api/chat/rooms/{}/members/{}", room_id, bethel.id)),
        &zion.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.delete(&format!("/api/chat/rooms/{}", room_id)), &zion.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_outsiders_and_room_rules() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;
    let salem = app.father_of("Salem").await;

    let response = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "room_type": "direct", "member_ids": [zion.id, salem.id] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "member_ids": [zion.id] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let room: Value = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "name": "Youth", "member_ids": [zion.id] }))
        .await
        .json();
    let room_id = room["id"].as_i64().unwrap();

    let response = authorized(
        app.server.get(&format!("/api/chat/rooms/{}/messages", room_id)),
        &salem.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(
        app.server.post(&format!("/api/chat/rooms/{}/members", room_id)),
        &bethel.token,
    )
    .json(&json!({ "user_id": salem.id }))
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = authorized(
        app.server.post(&format!("/api/chat/rooms/{}/members", room_id)),
        &bethel.token,
    )
    .json(&json!({ "user_id": salem.id }))
    .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = authorized(
        app.server.get(&format!("/api/chat/rooms/{}/messages", room_id)),
        &salem.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = authorized(app.server.get("/api/chat/rooms/999"), &salem.token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
