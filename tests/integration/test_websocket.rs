//! Chat events over a real socket

use std::net::SocketAddr;
use std::time::Duration;

use church_office::app::build_app;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::common::{authorized, TestApp};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_app(app.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, token: &str) -> Socket {
    let url = format!("ws://{}/api/ws?token={}", addr, token);
    let (socket, _) = connect_async(&url).await.unwrap();
    socket
}

/// Next JSON event whose `type` matches, skipping anything else
async fn next_event(socket: &mut Socket, event_type: &str) -> Value {
    let wait = async {
        while let Some(frame) = socket.next().await {
            if let Message::Text(text) = frame.unwrap() {
                let event: Value = serde_json::from_str(&text).unwrap();
                if event["type"] == event_type {
                    return event;
                }
            }
        }
        panic!("socket closed before {}", event_type);
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", event_type))
}

async fn send(socket: &mut Socket, frame: Value) {
    socket.send(Message::Text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_connect_and_ping() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let addr = serve(&app).await;

    let mut socket = connect(addr, &father.token).await;
    let connected = next_event(&mut socket, "connected").await;
    assert_eq!(connected["user_id"], father.id);
    assert_eq!(connected["online_users"], json!([father.id]));

    send(&mut socket, json!({ "type": "ping" })).await;
    let pong = next_event(&mut socket, "pong").await;
    assert!(pong["timestamp"].as_str().unwrap().starts_with("2025-06-20T09:00:00"));

    send(&mut socket, json!({ "type": "dance" })).await;
    let error = next_event(&mut socket, "error").await;
    assert!(error["message"].as_str().unwrap().starts_with("Invalid message"));

    let health: Value = app.server.get("/api/health").await.json();
    assert_eq!(health["websocket_connections"], 1);
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let mut socket = connect(addr, "not-a-jwt").await;
    let error = next_event(&mut socket, "error").await;
    assert!(error["message"].is_string());
    assert_eq!(app.state.hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_room_events_reach_members() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;
    let salem = app.father_of("Salem").await;
    let addr = serve(&app).await;

    let room: Value = authorized(app.server.post("/api/chat/rooms"), &bethel.token)
        .json(&json!({ "name": "Choir", "member_ids": [zion.id] }))
        .await
        .json();
    let room_id = room["id"].as_i64().unwrap();

    let mut listener = connect(addr, &zion.token).await;
    next_event(&mut listener, "connected").await;
    send(&mut listener, json!({ "type": "join_room", "room_id": room_id })).await;
    let joined = next_event(&mut listener, "user_joined_room").await;
    assert_eq!(joined["user_id"], zion.id);

    // Outsiders cannot subscribe
    let mut outsider = connect(addr, &salem.token).await;
    next_event(&mut outsider, "connected").await;
    send(&mut outsider, json!({ "type": "join_room", "room_id": room_id })).await;
    let refused = next_event(&mut outsider, "error").await;
    assert_eq!(refused["message"], "You are not a member of this room");

    authorized(
        app.server.post(&format!("/api/chat/rooms/{}/messages", room_id)),
        &bethel.token,
    )
    .json(&json!({ "content": "Rehearsal moved to seven" }))
    .await;

    let event = next_event(&mut listener, "new_message").await;
    assert_eq!(event["room_id"], room_id);
    assert_eq!(event["message"]["content"], "Rehearsal moved to seven");
    assert_eq!(event["message"]["sender_id"], bethel.id);
}
