//! Dashboard event stream.
//!
//! `/ws` fans out completed-game records as JSON text frames. The
//! stream is one-way; inbound frames are drained only to notice the
//! close. A subscriber that lags far enough to miss events is resumed
//! from the current position rather than disconnected.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::AppState;

pub async fn dashboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.events.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let record = match event {
                    Ok(record) => record,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "dashboard subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let frame = match serde_json::to_string(&record) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "failed to serialize dashboard event");
                        continue;
                    }
                };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!("dashboard subscriber disconnected");
}
