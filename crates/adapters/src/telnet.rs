//! Telnet transport: a raw `TcpListener`, CRLF-terminated lines, UTF-8 with
//! a Latin-1 fallback per §6. No teacher analogue (the teacher only speaks
//! WebSocket); the per-connection task/channel concurrency shape is carried
//! over directly from `websocket.rs`/the teacher's `handle_socket`.

use std::sync::Arc;

use gaia_app::Pipeline;
use gaia_domain::SessionId;
use gaia_protocol::ServerMessage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::session_registry::SharedSessionRegistry;

const WELCOME_BANNER: &str = "Welcome to GAIA.\r\nconnect <user> <password>\r\n";

pub async fn run(listener: TcpListener, pipeline: Arc<Pipeline>, registry: SharedSessionRegistry) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "telnet accept failed");
                continue;
            }
        };
        let pipeline = pipeline.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr.to_string(), pipeline, registry).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: String,
    pipeline: Arc<Pipeline>,
    registry: SharedSessionRegistry,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let session_id = SessionId::new();
    let mut rx = registry.register(session_id, peer.clone());
    pipeline.on_connect(session_id);

    info!(%session_id, %peer, "telnet connection established");

    if write_half.write_all(WELCOME_BANNER.as_bytes()).await.is_err() {
        pipeline.on_disconnect(&session_id);
        registry.forget(&session_id);
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let line = render_line(&msg);
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if matches!(msg, ServerMessage::Disconnected { .. }) {
                break;
            }
        }
    });

    loop {
        match lines.next_line().await {
            Ok(Some(raw)) => {
                registry.touch(&session_id);
                let text = decode_lossy(raw.as_bytes());
                pipeline.handle_line(session_id, &text).await;
            }
            Ok(None) => {
                info!(%session_id, "telnet connection closed by peer");
                break;
            }
            Err(err) => {
                warn!(%session_id, error = %err, "telnet read error");
                break;
            }
        }
    }

    pipeline.on_disconnect(&session_id);
    registry.forget(&session_id);
    send_task.abort();

    info!(%session_id, "telnet connection terminated");
}

/// Telnet input is nominally UTF-8; a line that isn't valid UTF-8 is decoded
/// byte-for-byte as Latin-1 instead of being rejected, per §6.
fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn render_line(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::Output { text } => format!("{text}\r\n"),
        ServerMessage::System { text } => format!("*** {text}\r\n"),
        ServerMessage::Error { code, message } => format!("*** {code}: {message}\r\n"),
        ServerMessage::Disconnected { reason } => format!("*** {reason}\r\n"),
        ServerMessage::Heartbeat => String::new(),
    }
}
