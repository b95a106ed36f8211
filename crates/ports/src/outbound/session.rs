//! The live-connection side of a session: delivering output and querying
//! connection facts, independent of whether the transport is telnet or
//! WebSocket.
//!
//! Grounded on `other_examples` `rdaum-moor`'s `Session` trait
//! (commit/rollback/request_input/send_event/send_system_msg/shutdown/
//! connection_name/disconnect/connected_players/connected_seconds/
//! idle_seconds). GAIA has no transactional task model, so commit/rollback
//! are dropped; the delivery and connection-introspection methods carry
//! over directly.

use async_trait::async_trait;
use gaia_domain::SessionId;
use thiserror::Error;

#[cfg(feature = "testing")]
use mockall::automock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} is not connected")]
    NotConnected(String),

    #[error("outbound channel full for session {0}")]
    ChannelFull(String),

    #[error("outbound channel closed for session {0}")]
    ChannelClosed(String),
}

#[cfg_attr(feature = "testing", automock)]
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Delivers a line of narration/output to this session's client.
    async fn send_event(&self, session: &SessionId, text: &str) -> Result<(), SessionError>;

    /// Delivers an out-of-band system notice (connect/disconnect banners).
    async fn send_system_msg(&self, session: &SessionId, text: &str) -> Result<(), SessionError>;

    /// Closes the connection, optionally with a final message.
    async fn disconnect(&self, session: &SessionId, reason: Option<&str>) -> Result<(), SessionError>;

    fn connection_name(&self, session: &SessionId) -> Option<String>;

    fn connected_seconds(&self, session: &SessionId) -> Option<i64>;

    fn idle_seconds(&self, session: &SessionId) -> Option<i64>;

    fn connected_sessions(&self) -> Vec<SessionId>;
}
