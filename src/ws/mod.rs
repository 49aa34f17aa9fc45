pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::engine::SessionCoordinator;
use crate::notify::{BroadcastNotifier, RealtimeNotifier, SessionEvent};
use crate::protocol::{event_message, ClientMessage, ServerMessage, SnapshotView};
use crate::store::{MemoryStore, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new());
        let coordinator = Arc::new(SessionCoordinator::new(
            store,
            notifier.clone() as Arc<dyn RealtimeNotifier>,
        ));
        Self {
            coordinator,
            notifier,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if send(&mut sender, &welcome).await.is_err() {
        return;
    }

    // Subscribed lazily, once the client names a session.
    let mut session_id: Option<String> = None;
    let mut events: Option<broadcast::Receiver<SessionEvent>> = None;

    loop {
        tokio::select! {
            event = recv_event(&mut events) => {
                match event {
                    EventPoll::Event(event) => {
                        if send(&mut sender, &event_message(&event)).await.is_err() {
                            break;
                        }
                    }
                    EventPoll::Lagged => {
                        // Missed broadcasts: fall back to one consistent re-read.
                        if let Some(ref id) = session_id {
                            if let Ok(snapshot) = state.coordinator.snapshot(id).await {
                                let msg = ServerMessage::SessionState {
                                    view: SnapshotView::from(&snapshot),
                                };
                                if send(&mut sender, &msg).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    EventPoll::Closed => {
                        events = None;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("received message: {}", text);
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let outcome = handlers::handle_message(client_msg, &state).await;
                                if let Some(id) = outcome.subscribe {
                                    events = Some(state.notifier.subscribe(&id));
                                    session_id = Some(id);
                                }
                                if let Some(reply) = outcome.reply {
                                    if send(&mut sender, &reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

enum EventPoll {
    Event(Box<SessionEvent>),
    Lagged,
    Closed,
}

async fn recv_event(events: &mut Option<broadcast::Receiver<SessionEvent>>) -> EventPoll {
    match events {
        Some(rx) => match rx.recv().await {
            Ok(event) => EventPoll::Event(Box::new(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("subscriber lagged, skipped {} events", skipped);
                EventPoll::Lagged
            }
            Err(broadcast::error::RecvError::Closed) => EventPoll::Closed,
        },
        // No subscription yet: wait forever
        None => std::future::pending().await,
    }
}

async fn send(
    sender: &mut (impl SinkExt<Message> + Unpin),
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
