//! WebSocket viewer handler - streams captured requests for one endpoint

use crate::directory::{ConnectionDirectory, ConnectionId};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use hookrelay_common::{constants, ViewerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

/// Build the viewer router
pub fn router() -> Router<AppState> {
    Router::new().route("/ws/{endpoint}", get(ws_handler))
}

/// WebSocket upgrade handler. Anything that is not an upgrade gets 426.
async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Path(endpoint_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, endpoint_id)),
        Err(e) => {
            tracing::debug!("Non-upgrade request for viewer of {}: {}", endpoint_id, e);
            (StatusCode::UPGRADE_REQUIRED, "Upgrade required").into_response()
        }
    }
}

/// Directory entry for one socket, removed when dropped
struct Registration {
    directory: Arc<ConnectionDirectory>,
    connection_id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.directory.remove_by_connection_id(self.connection_id);
    }
}

/// Handle a viewer connection
async fn handle_socket(socket: WebSocket, state: AppState, endpoint_id: String) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<Arc<str>>(constants::VIEWER_CHANNEL_CAPACITY);

    state.directory.add(connection_id, &endpoint_id, event_tx);
    let registration = Registration {
        directory: state.directory.clone(),
        connection_id,
    };
    tracing::info!("Viewer {} connected to endpoint {}", connection_id, endpoint_id);

    let hello = ViewerEvent::Connected {
        endpoint_id: endpoint_id.clone(),
        connection_id,
    };
    match hello.to_json() {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                tracing::debug!("Viewer {} went away before hello", connection_id);
                return;
            }
        }
        Err(e) => tracing::error!("Failed to serialize hello: {}", e),
    }

    let ping_every = Duration::from_secs(constants::WS_PING_INTERVAL_SECONDS);
    let pong_timeout = Duration::from_secs(constants::WS_PONG_TIMEOUT_SECONDS);
    let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            Some(payload) = event_rx.recv() => {
                if sender.send(Message::Text(payload.to_string().into())).await.is_err() {
                    break "send failed";
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => break "closed by viewer",
                    Some(Ok(_)) => last_seen = Instant::now(),
                    Some(Err(e)) => {
                        tracing::debug!("Viewer {} socket error: {}", connection_id, e);
                        break "transport error";
                    }
                    None => break "transport closed",
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() > pong_timeout {
                    break "ping timeout";
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break "ping failed";
                }
            }
        }
    };

    // Close, error and timeout all end up here
    drop(registration);
    tracing::info!(
        "Viewer {} disconnected from endpoint {} ({})",
        connection_id,
        endpoint_id,
        reason
    );
}
