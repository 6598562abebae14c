//! WebSocket handler for live monitoring events
//!
//! Each socket gets an outbound queue registered with the [`ConnectionRegistry`].
//! A writer task owns the socket sink and drains that queue, a heartbeat task
//! feeds it every 30 seconds, and the read loop answers client commands through
//! the same queue.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tracing::{debug, info, warn};

use crate::{
    api::state::ApiState,
    events::{
        connections::{HEARTBEAT_PERIOD, outbound_channel},
        event::reply_to_command,
    },
};

/// WebSocket upgrade handler
///
/// GET /api/v1/ws/monitoring
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: ApiState) {
    let connections = state.broadcaster.connections().clone();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = outbound_channel();

    let id = connections.register(tx.clone()).await;
    info!("WebSocket client {id} connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let heartbeat = connections.spawn_heartbeat(id, tx.clone(), HEARTBEAT_PERIOD);

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::to_string(&reply_to_command(&text)) {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!("failed to serialize reply: {e}");
                            continue;
                        }
                    };
                    if tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    heartbeat.abort();
    connections.unregister(id).await;

    info!("WebSocket client {id} disconnected");
}
