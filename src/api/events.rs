//! Typed change events and the WebSocket stream that carries them.
//!
//! Mutating handlers publish a `ChangeEvent` after committing. Dashboard
//! clients subscribe over WebSocket and refresh from the API on receipt,
//! so the server stays the single source of truth.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::auth::get_current_user;
use crate::AppState;

/// Capacity of the broadcast channel behind the event stream.
/// Slow subscribers past this many pending events see a lag notice.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A change worth telling dashboard clients about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    LeadCreated { id: String },
    LeadDeleted { id: String },
    ReviewSubmitted { id: String },
    ReviewApproved { id: String },
    ReviewDeleted { id: String },
    StudentChanged { id: String },
    ProfileUpdated,
    RolesChanged { user_id: String },
}

/// Publish an event to all connected subscribers.
/// A send error only means nobody is listening right now.
pub fn publish(state: &AppState, event: ChangeEvent) {
    if state.events.send(event.clone()).is_err() {
        tracing::debug!(?event, "No event subscribers connected");
    }
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// Validate a token from query params. Accepts the same credentials as the
/// HTTP middleware: admin token or a live session.
async fn validate_ws_token(state: &AppState, query: &WsAuthQuery) -> bool {
    let token = match &query.token {
        Some(t) => t,
        None => return false,
    };

    get_current_user(&state.db, &state.config, token).await.is_ok()
}

/// WebSocket endpoint for streaming change events
/// GET /api/events/stream?token=...
pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate token from query params
    if !validate_ws_token(&state, &query).await {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(ws.on_upgrade(move |socket| handle_event_stream(socket, state)))
}

async fn handle_event_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    // Send connection established message
    if sender
        .send(Message::Text(r#"{"type":"connected"}"#.into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            // Forward change events to the client
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize change event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event stream subscriber lagged");
                        let notice = serde_json::json!({
                            "type": "lagged",
                            "skipped": skipped,
                        });
                        if sender.send(Message::Text(notice.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = sender.send(Message::Text(r#"{"type":"end"}"#.into())).await;
                        return;
                    }
                }
            }

            // Handle incoming messages (for ping/pong or close)
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ChangeEvent::LeadCreated {
            id: "abc-123".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"lead_created","id":"abc-123"}"#);

        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_profile_event_has_no_payload() {
        let json = serde_json::to_string(&ChangeEvent::ProfileUpdated).unwrap();
        assert_eq!(json, r#"{"type":"profile_updated"}"#);
    }

    #[test]
    fn test_role_event_names_the_user() {
        let event = ChangeEvent::RolesChanged {
            user_id: "u-1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"roles_changed","user_id":"u-1"}"#);
    }

    #[tokio::test]
    async fn test_broadcast_fanout() {
        let (tx, _) = broadcast::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);
        let mut rx_a = tx.subscribe();
        let mut rx_b = tx.subscribe();

        tx.send(ChangeEvent::ProfileUpdated).unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), ChangeEvent::ProfileUpdated);
        assert_eq!(rx_b.recv().await.unwrap(), ChangeEvent::ProfileUpdated);
    }
}
