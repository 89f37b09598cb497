//! WebSocket endpoint for live updates
//!
//! GET /api/v1/ws?token=<JWT>
//! The token travels in the query string because browser WebSockets cannot
//! set an Authorization header.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{ClientMessage, ServerMessage};
use tokio::sync::broadcast;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::realtime::TopicFilter;
use crate::services::auth::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// Upgrade an authenticated request to a socket session
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let user = AuthService::authenticate_token(&query.token, &state.config.jwt.secret)?;

    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, user)))
}

async fn ws_session(socket: WebSocket, state: AppState, user: AuthUser) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.events.subscribe();
    let mut filter = TopicFilter::all();

    tracing::info!(user_id = %user.user_id, role = %user.role, "socket connected");

    let ready = ServerMessage::Ready {
        topics: filter.topics(),
    };
    if send_message(&mut sink, &ready).await.is_err() {
        return;
    }

    let mut ping_interval =
        tokio::time::interval(Duration::from_secs(state.config.realtime.ping_interval_secs.max(1)));
    ping_interval.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !filter.accepts(&event) {
                            continue;
                        }
                        if send_message(&mut sink, &ServerMessage::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(user_id = %user.user_id, missed, "socket subscriber lagged");
                        if send_message(&mut sink, &ServerMessage::Resync { missed }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            frame = stream.next() => {
                let reply = match frame {
                    Some(Ok(Message::Text(text))) => handle_client_frame(&text, &mut filter),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user.user_id, "socket read error: {}", e);
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if send_message(&mut sink, &reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(user_id = %user.user_id, "socket disconnected");
}

/// Apply a client frame to the session and produce the reply, if any
pub fn handle_client_frame(text: &str, filter: &mut TopicFilter) -> Option<ServerMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { topics }) => {
            filter.subscribe(&topics);
            Some(ServerMessage::Ready {
                topics: filter.topics(),
            })
        }
        Ok(ClientMessage::Unsubscribe { topics }) => {
            filter.unsubscribe(&topics);
            Some(ServerMessage::Ready {
                topics: filter.topics(),
            })
        }
        Ok(ClientMessage::Ping) => Some(ServerMessage::Pong),
        Err(e) => Some(ServerMessage::Error {
            message: format!("Unrecognised message: {}", e),
        }),
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::error!("Failed to serialise socket message: {}", e);
    })?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Topic;

    #[test]
    fn test_subscribe_frame_updates_filter() {
        let mut filter = TopicFilter::all();
        let reply = handle_client_frame(r#"{"type":"unsubscribe","topics":["day","chat"]}"#, &mut filter);
        match reply {
            Some(ServerMessage::Ready { topics }) => assert_eq!(topics, vec![Topic::Orders]),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_ping_frame() {
        let mut filter = TopicFilter::all();
        assert!(matches!(
            handle_client_frame(r#"{"type":"ping"}"#, &mut filter),
            Some(ServerMessage::Pong)
        ));
    }

    #[test]
    fn test_garbage_frame_yields_error() {
        let mut filter = TopicFilter::all();
        assert!(matches!(
            handle_client_frame("not json", &mut filter),
            Some(ServerMessage::Error { .. })
        ));
        assert_eq!(filter, TopicFilter::all());
    }
}
