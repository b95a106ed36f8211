//! WebSocket transport: one text frame in, one or more `ServerMessage`
//! frames out.
//!
//! Grounded on `wrldbldr-engine-adapters/src/infrastructure/websocket/
//! mod.rs`'s `ws_handler`/`handle_socket` shape — split sink/stream, a
//! bounded per-connection channel, a forwarder task serializing outbound
//! frames, `try_send` backpressure on the inbound-dispatch side. Dispatch
//! itself goes through [`gaia_app::Pipeline`] rather than the teacher's
//! `dispatch::handle_message`, since GAIA's game logic is one line-oriented
//! pipeline rather than a CRUD request/response table.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use gaia_app::Pipeline;
use gaia_domain::SessionId;
use gaia_protocol::{ClientMessage, ServerMessage};
use tracing::{info, warn};

use crate::session_registry::SharedSessionRegistry;

#[derive(Clone)]
pub struct WebSocketState {
    pub pipeline: Arc<Pipeline>,
    pub registry: SharedSessionRegistry,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let session_id = SessionId::new();
    let mut rx = state.registry.register(session_id, format!("ws:{session_id}"));
    state.pipeline.on_connect(session_id);

    info!(%session_id, "WebSocket connection established");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::InputLine { text }) => {
                    state.pipeline.handle_line(session_id, &text).await;
                }
                Ok(ClientMessage::Heartbeat) => {}
                Ok(ClientMessage::Disconnect) => break,
                Err(err) => {
                    warn!(%session_id, error = %err, "failed to parse client message");
                    let _ = state
                        .registry
                        .send_raw(&session_id, ServerMessage::error("PROTOCOL", format!("invalid message: {err}")));
                }
            },
            Ok(Message::Close(_)) => {
                info!(%session_id, "WebSocket connection closed by client");
                break;
            }
            Ok(Message::Ping(_)) => {}
            Err(err) => {
                warn!(%session_id, error = %err, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.pipeline.on_disconnect(&session_id);
    state.registry.forget(&session_id);
    send_task.abort();

    info!(%session_id, "WebSocket connection terminated");
}
