//! DTOs for the administrative surface: listing and inspecting live
//! sessions and stored objects. Grounded on the envelope/constants style of
//! `janet-world`'s protocol module — small tagged structs, no behavior.

use chrono::{DateTime, Utc};
use gaia_domain::{AccountId, ObjectId, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub account_id: Option<AccountId>,
    pub character_id: Option<ObjectId>,
    pub connected_at: DateTime<Utc>,
    pub idle_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: ObjectId,
    pub display_name: String,
    pub parents: Vec<ObjectId>,
    pub location: Option<ObjectId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminCommand {
    ListSessions,
    ListObjectsByLocation { location: ObjectId },
    DisconnectSession { session_id: SessionId },
}
