//! Live comment feed over WebSocket.
//!
//! Every hub event is forwarded as a JSON text frame. The first frame is an
//! `init` message describing the current session.

use std::time::Duration;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::api::models::WsInitMessage;
use crate::api::server::AppState;

/// Heartbeat interval in seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(comments_ws))
}

async fn comments_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Register before describing the session so no event falls in between.
    let mut subscription = state.hub.subscribe();
    let subscriber_id = subscription.id;

    let status = state.controller.status().await;
    let init = WsInitMessage {
        running: status.running,
        session_id: status.session.as_ref().map(|s| s.session_id),
        title: status.session.as_ref().and_then(|s| s.title.clone()),
        phase: status.session.as_ref().map(|s| s.phase),
    };

    let init_sent = match serde_json::to_string(&init) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            debug!("Failed to encode init message: {}", e);
            false
        }
    };

    if init_sent {
        let mut heartbeat_interval =
            tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        heartbeat_interval.tick().await;
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(Message::Ping(data))) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Pong(_))) => awaiting_pong = false,
                        Some(Err(e)) => {
                            debug!("WebSocket error: {}", e);
                            break;
                        }
                        _ => {}
                    }
                }

                event = subscription.rx.recv() => {
                    let Some(event) = event else { break };
                    match serde_json::to_string(event.as_ref()) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!(subscriber = subscriber_id, "client gone");
                                break;
                            }
                        }
                        Err(e) => debug!(seq = event.seq, "Failed to encode event: {}", e),
                    }
                }

                _ = heartbeat_interval.tick() => {
                    if awaiting_pong {
                        debug!(subscriber = subscriber_id, "client failed to respond to Ping, closing");
                        break;
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    awaiting_pong = true;
                }
            }
        }
    }

    state.hub.unsubscribe(subscriber_id);
}
