//! Wire-level types shared by the telnet and WebSocket transports.

pub mod admin;
pub mod messages;

pub use admin::{AdminCommand, ObjectSummary, SessionSummary};
pub use messages::{ClientMessage, ServerMessage};
