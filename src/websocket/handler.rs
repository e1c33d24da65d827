//! Chat WebSocket endpoint
//!
//! `GET /api/ws?token=<jwt>`. One task per socket drives three sources:
//! client frames, hub events queued for this connection, and the heartbeat.

use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::interval;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::logging::{log_websocket_connection, log_websocket_message_received};
use crate::models::user::User;
use crate::websocket::messages::{ClientMessage, ServerEvent};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket, params.token))
}

async fn handle_socket(state: AppState, mut socket: WebSocket, token: Option<String>) {
    let user = match token {
        Some(token) => state.auth.authenticate(&token).await,
        None => Err(AppError::Unauthorized),
    };
    let user = match user {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "Rejected WebSocket connection");
            reject(&mut socket, &e.to_string()).await;
            return;
        }
    };

    let (connection_id, receiver) = match state.hub.register(user.id).await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(user_id = user.id, error = %e, "WebSocket connection refused");
            reject(&mut socket, &e.to_string()).await;
            return;
        }
    };

    let span = crate::websocket_span!(connection_id, user.id);
    run_connection(&state, socket, &user, connection_id, receiver)
        .instrument(span)
        .await;

    state.hub.unregister(connection_id).await;
    log_websocket_connection(&connection_id.to_string(), user.id, false);
}

async fn reject(socket: &mut WebSocket, message: &str) {
    if let Ok(text) = serde_json::to_string(&ServerEvent::error(message)) {
        let _ = socket.send(WsMessage::Text(text)).await;
    }
    let _ = socket.send(WsMessage::Close(None)).await;
}

async fn run_connection(
    state: &AppState,
    socket: WebSocket,
    user: &User,
    connection_id: Uuid,
    mut receiver: tokio::sync::mpsc::Receiver<ServerEvent>,
) {
    log_websocket_connection(&connection_id.to_string(), user.id, true);
    let (mut sender, mut incoming) = socket.split();

    let connected = ServerEvent::Connected {
        connection_id: connection_id.to_string(),
        user_id: user.id,
        online_users: state.hub.online_users().await,
    };
    if send_event(&mut sender, &connected).await.is_err() {
        return;
    }

    let heartbeat = Duration::from_secs(state.config.websocket_heartbeat_interval);
    let timeout = Duration::from_secs(state.config.websocket_timeout);
    let mut ticker = interval(heartbeat);
    ticker.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            frame = incoming.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        last_seen = Instant::now();
                        if let Some(reply) = handle_client_message(state, user, connection_id, &text).await {
                            if send_event(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        last_seen = Instant::now();
                        if sender.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        last_seen = Instant::now();
                        let reply = ServerEvent::error("Binary frames are not supported");
                        if send_event(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }

            event = receiver.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = ticker.tick() => {
                if last_seen.elapsed() > timeout {
                    info!(user_id = user.id, "WebSocket connection timed out");
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
                if sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, WsMessage>, event: &ServerEvent) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| {
        warn!(error = %e, "Failed to serialize server event");
    })?;
    sender.send(WsMessage::Text(text)).await.map_err(|_| ())
}

/// Apply one client frame. Returns a direct reply for the sender, if any.
async fn handle_client_message(
    state: &AppState,
    user: &User,
    connection_id: Uuid,
    text: &str,
) -> Option<ServerEvent> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return Some(ServerEvent::error(format!("Invalid message: {}", e))),
    };
    log_websocket_message_received(&connection_id.to_string(), message.message_type());

    match message {
        ClientMessage::JoinRoom { room_id } => match state.chat.is_member(room_id, user.id).await {
            Ok(true) => {
                state.hub.join_room(connection_id, room_id).await;
                None
            }
            Ok(false) => Some(ServerEvent::error("You are not a member of this room")),
            Err(e) => {
                warn!(room_id, error = %e, "Membership check failed");
                Some(ServerEvent::error("Could not join room"))
            }
        },
        ClientMessage::LeaveRoom { room_id } => {
            state.hub.leave_room(connection_id, room_id).await;
            None
        }
        ClientMessage::Typing { room_id, is_typing } => {
            if state.hub.set_typing(connection_id, room_id, is_typing).await {
                None
            } else {
                Some(ServerEvent::error("Join the room before typing in it"))
            }
        }
        ClientMessage::Ping => Some(ServerEvent::Pong {
            timestamp: state.time_provider.now_utc(),
        }),
    }
}
