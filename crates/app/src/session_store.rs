//! In-memory registry of live [`gaia_domain::Session`] records, plus the
//! transient "unembodied user" object that follows a session until it
//! embodies a character.
//!
//! Sessions are ephemeral: nothing here is written to the document store.
//! Grounded on the same `DashMap`-per-key shape as `world_cache.rs`, since
//! this is the same "concurrent in-memory state behind simple get/insert/
//! remove" problem.

use std::sync::Arc;

use dashmap::DashMap;
use gaia_domain::{AccountId, ObjectId, Session, SessionId};

use crate::world_cache::WorldCache;

/// Parent of every transient user object, so `@this.attr` lookups against it
/// can still resolve shared `#user` behavior through inheritance.
pub const TRANSIENT_USER_PARENT: &str = "#user";

pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
    cache: Arc<WorldCache>,
}

impl SessionStore {
    pub fn new(cache: Arc<WorldCache>) -> Self {
        Self {
            sessions: DashMap::new(),
            cache,
        }
    }

    /// Registers a newly connected session and installs its transient user
    /// object (cache-only, never written to the store).
    pub fn connect(&self, id: SessionId) -> ObjectId {
        self.sessions.insert(id, Session::new(id));
        let transient = transient_user_id(&id);
        let object = gaia_domain::Object::new(transient.clone(), "a connecting user")
            .with_parents(vec![ObjectId::new(TRANSIENT_USER_PARENT)]);
        self.cache.put(object);
        transient
    }

    /// Evicts the session and its transient user object. Called on socket
    /// close, regardless of whether the session ever authenticated.
    pub fn disconnect(&self, id: &SessionId) {
        self.sessions.remove(id);
        self.cache.evict_local(&transient_user_id(id));
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|s| s.clone())
    }

    pub fn transient_user(&self, id: &SessionId) -> ObjectId {
        transient_user_id(id)
    }

    /// The effective actor for this session: the embodied character if any,
    /// otherwise the transient user object.
    pub fn actor_of(&self, id: &SessionId) -> ObjectId {
        self.get(id)
            .and_then(|s| s.character_id)
            .unwrap_or_else(|| transient_user_id(id))
    }

    pub fn touch(&self, id: &SessionId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.touch();
        }
    }

    pub fn authenticate(&self, id: &SessionId, account_id: AccountId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.authenticate(account_id);
        }
    }

    pub fn embody(&self, id: &SessionId, character: ObjectId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.embody(character);
        }
    }

    pub fn disembody(&self, id: &SessionId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.disembody();
        }
    }

    /// Increments and returns the failed-login counter; callers disconnect
    /// once it reaches [`crate::accounts::MAX_FAILED_LOGINS`].
    pub fn record_failed_login(&self, id: &SessionId) -> u8 {
        self.sessions
            .get_mut(id)
            .map(|mut s| s.record_failed_login())
            .unwrap_or(0)
    }

    pub fn connected_session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}

fn transient_user_id(session: &SessionId) -> ObjectId {
    ObjectId::new(format!("#user:{session}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullStore;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(WorldCache::new(Arc::new(NullStore))))
    }

    #[test]
    fn connect_installs_a_transient_user_as_the_default_actor() {
        let store = store();
        let id = SessionId::new();
        let transient = store.connect(id);
        assert_eq!(store.actor_of(&id), transient);
    }

    #[test]
    fn embody_replaces_the_default_actor() {
        let store = store();
        let id = SessionId::new();
        store.connect(id);
        store.embody(&id, ObjectId::new("#alice"));
        assert_eq!(store.actor_of(&id), ObjectId::new("#alice"));
    }

    #[test]
    fn disconnect_forgets_the_session() {
        let store = store();
        let id = SessionId::new();
        store.connect(id);
        store.disconnect(&id);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn failed_login_counter_increments_per_session() {
        let store = store();
        let id = SessionId::new();
        store.connect(id);
        assert_eq!(store.record_failed_login(&id), 1);
        assert_eq!(store.record_failed_login(&id), 2);
    }
}
