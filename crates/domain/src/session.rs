//! The domain-level session record: who is connected, what they have logged
//! into, and which character (if any) they are currently embodying.
//!
//! This is distinct from the transport-level connection handled in
//! `gaia-adapters` — a `Session` here is pure state, with no socket or
//! channel attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ObjectId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStage {
    /// Connected, no successful login yet.
    Unauthenticated,
    /// Logged into an account, no character embodied.
    Admin,
    /// Logged in and controlling a character in the world.
    Embodied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub stage: SessionStage,
    pub account_id: Option<AccountId>,
    pub character_id: Option<ObjectId>,
    pub failed_login_attempts: u8,
    pub connected_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage: SessionStage::Unauthenticated,
            account_id: None,
            character_id: None,
            failed_login_attempts: 0,
            connected_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.stage, SessionStage::Admin | SessionStage::Embodied)
    }

    pub fn is_embodied(&self) -> bool {
        matches!(self.stage, SessionStage::Embodied)
    }

    pub fn authenticate(&mut self, account_id: AccountId) {
        self.account_id = Some(account_id);
        self.stage = SessionStage::Admin;
        self.failed_login_attempts = 0;
        self.touch();
    }

    pub fn embody(&mut self, character_id: ObjectId) {
        self.character_id = Some(character_id);
        self.stage = SessionStage::Embodied;
        self.touch();
    }

    pub fn disembody(&mut self) {
        self.character_id = None;
        if self.account_id.is_some() {
            self.stage = SessionStage::Admin;
        }
        self.touch();
    }

    pub fn record_failed_login(&mut self) -> u8 {
        self.failed_login_attempts += 1;
        self.failed_login_attempts
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn idle_seconds(&self) -> i64 {
        (Utc::now() - self.last_activity_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_unauthenticated() {
        let session = Session::new(SessionId::new());
        assert!(!session.is_admin());
        assert!(!session.is_embodied());
    }

    #[test]
    fn authenticate_then_embody_moves_through_stages() {
        let mut session = Session::new(SessionId::new());
        session.authenticate(AccountId::new());
        assert!(session.is_admin());
        assert!(!session.is_embodied());

        session.embody(ObjectId::new("#alice"));
        assert!(session.is_embodied());
    }

    #[test]
    fn disembody_returns_to_admin_stage_not_unauthenticated() {
        let mut session = Session::new(SessionId::new());
        session.authenticate(AccountId::new());
        session.embody(ObjectId::new("#alice"));
        session.disembody();
        assert!(session.is_admin());
        assert!(!session.is_embodied());
    }

    #[test]
    fn failed_login_counter_increments() {
        let mut session = Session::new(SessionId::new());
        assert_eq!(session.record_failed_login(), 1);
        assert_eq!(session.record_failed_login(), 2);
    }
}
