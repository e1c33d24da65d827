//! WebSocket Service
//!
//! In-process registry of chat connections. Each connection owns a bounded
//! queue; the socket task drains it. Rooms map to subscribed connections,
//! users map to all of their connections for presence and direct fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::websocket::messages::ServerEvent;

/// Per-connection queue depth before events are dropped for a slow client
const CONNECTION_QUEUE: usize = 256;

/// Typing indicators expire after this long without a refresh
pub const TYPING_TTL: Duration = Duration::from_secs(10);

const TYPING_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Connection {
    user_id: i64,
    sender: mpsc::Sender<ServerEvent>,
    rooms: HashSet<i64>,
}

#[derive(Debug, Default)]
struct HubState {
    connections: HashMap<Uuid, Connection>,
    by_user: HashMap<i64, HashSet<Uuid>>,
    rooms: HashMap<i64, HashSet<Uuid>>,
    typing: HashMap<(i64, i64), Instant>,
}

impl HubState {
    fn deliver(&self, connection_id: &Uuid, event: &ServerEvent) -> bool {
        let Some(connection) = self.connections.get(connection_id) else {
            return false;
        };
        match connection.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection_id = %connection_id, event = event.event_type(), "Connection queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    fn deliver_to_user(&self, user_id: i64, event: &ServerEvent) -> usize {
        self.by_user
            .get(&user_id)
            .map(|ids| ids.iter().filter(|id| self.deliver(id, event)).count())
            .unwrap_or(0)
    }

    fn deliver_to_room(&self, room_id: i64, event: &ServerEvent, exclude_user: Option<i64>) -> usize {
        let Some(ids) = self.rooms.get(&room_id) else {
            return 0;
        };
        ids.iter()
            .filter(|id| {
                self.connections
                    .get(id)
                    .is_some_and(|connection| Some(connection.user_id) != exclude_user)
            })
            .filter(|id| self.deliver(id, event))
            .count()
    }

    fn deliver_to_all(&self, event: &ServerEvent, exclude_user: Option<i64>) {
        for (id, connection) in &self.connections {
            if Some(connection.user_id) != exclude_user {
                self.deliver(id, event);
            }
        }
    }

    fn user_in_room(&self, user_id: i64, room_id: i64) -> bool {
        self.by_user.get(&user_id).is_some_and(|ids| {
            ids.iter().any(|id| {
                self.connections
                    .get(id)
                    .is_some_and(|connection| connection.rooms.contains(&room_id))
            })
        })
    }
}

/// Chat connection registry and fan-out
#[derive(Debug, Clone)]
pub struct ChatHub {
    state: Arc<RwLock<HubState>>,
    max_connections: usize,
}

impl ChatHub {
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(HubState::default())),
            max_connections,
        }
    }

    /// Register a socket for `user_id`. The first connection of a user
    /// announces them online to everyone else.
    pub async fn register(&self, user_id: i64) -> AppResult<(Uuid, mpsc::Receiver<ServerEvent>)> {
        let mut state = self.state.write().await;
        if state.connections.len() >= self.max_connections {
            return Err(AppError::websocket_error("Too many connections"));
        }

        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(CONNECTION_QUEUE);
        state.connections.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                rooms: HashSet::new(),
            },
        );

        let user_connections = state.by_user.entry(user_id).or_default();
        user_connections.insert(connection_id);
        let first = user_connections.len() == 1;

        if first {
            state.deliver_to_all(
                &ServerEvent::PresenceUpdate {
                    user_id,
                    is_online: true,
                },
                Some(user_id),
            );
        }

        debug!(connection_id = %connection_id, user_id, "Connection registered");
        Ok((connection_id, receiver))
    }

    /// Drop a connection. The last connection of a user announces them
    /// offline and clears their typing state.
    pub async fn unregister(&self, connection_id: Uuid) {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.remove(&connection_id) else {
            return;
        };

        for room_id in &connection.rooms {
            if let Some(ids) = state.rooms.get_mut(room_id) {
                ids.remove(&connection_id);
                if ids.is_empty() {
                    state.rooms.remove(room_id);
                }
            }
        }

        let user_id = connection.user_id;
        let last = match state.by_user.get_mut(&user_id) {
            Some(ids) => {
                ids.remove(&connection_id);
                ids.is_empty()
            }
            None => true,
        };

        if last {
            state.by_user.remove(&user_id);
            state.typing.retain(|(_, typing_user), _| *typing_user != user_id);
            state.deliver_to_all(
                &ServerEvent::PresenceUpdate {
                    user_id,
                    is_online: false,
                },
                None,
            );
        }

        debug!(connection_id = %connection_id, user_id, "Connection unregistered");
    }

    /// Subscribe a connection to room events and tell the room
    pub async fn join_room(&self, connection_id: Uuid, room_id: i64) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        connection.rooms.insert(room_id);
        let user_id = connection.user_id;
        state.rooms.entry(room_id).or_default().insert(connection_id);

        state.deliver_to_room(room_id, &ServerEvent::UserJoinedRoom { room_id, user_id }, None);
        true
    }

    pub async fn leave_room(&self, connection_id: Uuid, room_id: i64) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.rooms.remove(&room_id) {
            return false;
        }
        let user_id = connection.user_id;

        if let Some(ids) = state.rooms.get_mut(&room_id) {
            ids.remove(&connection_id);
            if ids.is_empty() {
                state.rooms.remove(&room_id);
            }
        }
        if !state.user_in_room(user_id, room_id) {
            state.typing.remove(&(room_id, user_id));
        }

        state.deliver_to_room(room_id, &ServerEvent::UserLeftRoom { room_id, user_id }, None);
        true
    }

    /// Update a typing indicator. Only connections subscribed to the room may
    /// type in it; other subscribers are told.
    pub async fn set_typing(&self, connection_id: Uuid, room_id: i64, is_typing: bool) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.get(&connection_id) else {
            return false;
        };
        if !connection.rooms.contains(&room_id) {
            return false;
        }
        let user_id = connection.user_id;

        if is_typing {
            state.typing.insert((room_id, user_id), Instant::now());
        } else {
            state.typing.remove(&(room_id, user_id));
        }

        state.deliver_to_room(
            room_id,
            &ServerEvent::TypingIndicator {
                room_id,
                user_id,
                is_typing,
            },
            Some(user_id),
        );
        true
    }

    /// Expire typing indicators older than `ttl`, telling each room
    pub async fn sweep_typing(&self, ttl: Duration) -> usize {
        let mut state = self.state.write().await;
        let expired: Vec<(i64, i64)> = state
            .typing
            .iter()
            .filter(|(_, since)| since.elapsed() >= ttl)
            .map(|(key, _)| *key)
            .collect();

        for (room_id, user_id) in &expired {
            state.typing.remove(&(*room_id, *user_id));
            state.deliver_to_room(
                *room_id,
                &ServerEvent::TypingIndicator {
                    room_id: *room_id,
                    user_id: *user_id,
                    is_typing: false,
                },
                Some(*user_id),
            );
        }
        expired.len()
    }

    /// Deliver to every connection of one user
    pub async fn send_to_user(&self, user_id: i64, event: &ServerEvent) -> usize {
        self.state.read().await.deliver_to_user(user_id, event)
    }

    /// Deliver to every connection of each listed user
    pub async fn send_to_users(&self, user_ids: &[i64], event: &ServerEvent) -> usize {
        let state = self.state.read().await;
        user_ids
            .iter()
            .map(|user_id| state.deliver_to_user(*user_id, event))
            .sum()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn online_users(&self) -> Vec<i64> {
        let mut users: Vec<i64> = self.state.read().await.by_user.keys().copied().collect();
        users.sort_unstable();
        users
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.state.read().await.by_user.contains_key(&user_id)
    }

    pub async fn typing_users(&self, room_id: i64) -> Vec<i64> {
        let mut users: Vec<i64> = self
            .state
            .read()
            .await
            .typing
            .keys()
            .filter(|(room, _)| *room == room_id)
            .map(|(_, user)| *user)
            .collect();
        users.sort_unstable();
        users
    }

    /// Start the typing-indicator sweep
    pub fn start_background_tasks(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(TYPING_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let expired = self.sweep_typing(TYPING_TTL).await;
                if expired > 0 {
                    debug!(expired, "Expired typing indicators");
                }
            }
        })
    }
}
