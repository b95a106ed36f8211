//! Wire messages exchanged with a connected client.
//!
//! Telnet connections never serialize these directly — the telnet adapter
//! speaks raw lines and only uses the `text`/`reason` fields embedded here.
//! The WebSocket adapter speaks these as tagged JSON, mirroring the
//! teacher's `ClientMessage`/`ServerMessage` split.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Heartbeat,
    /// A single line of raw input, exactly as the user typed it.
    InputLine { text: String },
    Disconnect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Heartbeat,
    /// Text produced in response to a command, or by another object's
    /// narration, destined for the terminal/client as-is.
    Output { text: String },
    /// Out-of-band notice (connect/disconnect banners, idle warnings).
    System { text: String },
    Error { code: String, message: String },
    Disconnected { reason: String },
}

impl ServerMessage {
    pub fn output(text: impl Into<String>) -> Self {
        Self::Output { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips_through_json() {
        let msg = ClientMessage::InputLine {
            text: "look".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        match back {
            ClientMessage::InputLine { text } => assert_eq!(text, "look"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn server_message_tags_are_snake_case() {
        let json = serde_json::to_string(&ServerMessage::output("hi")).unwrap();
        assert!(json.contains("\"type\":\"output\""));
    }
}
