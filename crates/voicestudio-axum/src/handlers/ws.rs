//! Event channel endpoint.
//!
//! `GET /api/ws/progress` upgrades to a WebSocket that receives every
//! message the [`ProgressBroadcaster`](crate::broadcaster::ProgressBroadcaster)
//! emits from the moment it connects. Inbound frames are read only to notice
//! when the peer goes away.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// `GET /api/ws/progress`
pub async fn progress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_progress_ws(socket, state))
}

async fn handle_progress_ws(socket: WebSocket, state: AppState) {
    let broadcaster = &state.broadcaster;
    let mut messages = broadcaster.subscribe();
    let shutdown = broadcaster.shutdown_token();
    let _connection = broadcaster.connect();

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            message = messages.recv() => match message {
                Ok(text) => {
                    if let Err(e) = sender.send(Message::Text(text.into())).await {
                        debug!(error = %e, "Progress socket send failed");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress socket fell behind; messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Progress socket read failed");
                    break;
                }
            },
        }
    }
}
