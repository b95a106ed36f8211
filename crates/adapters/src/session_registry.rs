//! [`SessionPort`] implementation shared by the telnet and WebSocket
//! transports: a `DashMap` of live per-connection outbound channels plus
//! connection metadata, so `gaia-app` never needs to know which transport a
//! session came in on.
//!
//! Grounded on the teacher's per-connection bounded `mpsc` channel in
//! `infrastructure/websocket/mod.rs`, generalized to hold either transport's
//! sender behind one enum.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use gaia_domain::SessionId;
use gaia_ports::{SessionError, SessionPort};
use tokio::sync::mpsc;
use tracing::warn;

use gaia_protocol::ServerMessage;

/// Matches the teacher's `CONNECTION_CHANNEL_BUFFER`: enough to absorb a
/// burst of narration without unbounded growth, small enough that a stalled
/// client's backlog is noticed quickly.
pub const CONNECTION_CHANNEL_BUFFER: usize = 256;

struct Connection {
    sender: mpsc::Sender<ServerMessage>,
    name: String,
    connected_at: Instant,
    last_activity: std::sync::Mutex<Instant>,
}

pub struct SessionRegistry {
    connections: DashMap<SessionId, Connection>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { connections: DashMap::new() }
    }

    /// Registers a freshly connected transport endpoint, returning the
    /// receiving half of its outbound channel for the transport's own
    /// forwarder task to drain.
    pub fn register(&self, session: SessionId, name: impl Into<String>) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);
        let now = Instant::now();
        self.connections.insert(
            session,
            Connection { sender: tx, name: name.into(), connected_at: now, last_activity: std::sync::Mutex::new(now) },
        );
        rx
    }

    pub fn forget(&self, session: &SessionId) {
        self.connections.remove(session);
    }

    pub fn touch(&self, session: &SessionId) {
        if let Some(conn) = self.connections.get(session) {
            *conn.last_activity.lock().unwrap() = Instant::now();
        }
    }

    /// Delivers a raw protocol-level message (e.g. a malformed-frame error)
    /// that has no equivalent in the [`SessionPort`] surface.
    pub fn send_raw(&self, session: &SessionId, message: ServerMessage) -> Result<(), SessionError> {
        self.send(session, message)
    }

    fn send(&self, session: &SessionId, message: ServerMessage) -> Result<(), SessionError> {
        let conn = self
            .connections
            .get(session)
            .ok_or_else(|| SessionError::NotConnected(session.to_string()))?;
        match conn.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%session, "outbound channel full, dropping message");
                Err(SessionError::ChannelFull(session.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::ChannelClosed(session.to_string())),
        }
    }
}

#[async_trait]
impl SessionPort for SessionRegistry {
    async fn send_event(&self, session: &SessionId, text: &str) -> Result<(), SessionError> {
        self.send(session, ServerMessage::output(text))
    }

    async fn send_system_msg(&self, session: &SessionId, text: &str) -> Result<(), SessionError> {
        self.send(session, ServerMessage::system(text))
    }

    async fn disconnect(&self, session: &SessionId, reason: Option<&str>) -> Result<(), SessionError> {
        let result = self.send(
            session,
            ServerMessage::Disconnected { reason: reason.unwrap_or("disconnected").to_string() },
        );
        self.connections.remove(session);
        result
    }

    fn connection_name(&self, session: &SessionId) -> Option<String> {
        self.connections.get(session).map(|c| c.name.clone())
    }

    fn connected_seconds(&self, session: &SessionId) -> Option<i64> {
        self.connections.get(session).map(|c| c.connected_at.elapsed().as_secs() as i64)
    }

    fn idle_seconds(&self, session: &SessionId) -> Option<i64> {
        self.connections
            .get(session)
            .map(|c| c.last_activity.lock().unwrap().elapsed().as_secs() as i64)
    }

    fn connected_sessions(&self) -> Vec<SessionId> {
        self.connections.iter().map(|e| *e.key()).collect()
    }
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;
