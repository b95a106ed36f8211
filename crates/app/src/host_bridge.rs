//! Bridges the G interpreter's [`gaia_glang::Host`] port to the world
//! cache, the session registry, and the account store — the standard
//! library's window back into the world.

use std::sync::Arc;

use async_trait::async_trait;
use gaia_domain::{AccountId, GValue, ObjectId, Role};
use gaia_glang::interpreter::EvalContext;
use gaia_glang::{GError, Host};
use gaia_ports::{AccountRepositoryPort, SessionPort};
use tracing::info;

use crate::world_cache::WorldCache;

pub struct GameHost {
    cache: Arc<WorldCache>,
    accounts: Arc<dyn AccountRepositoryPort>,
    sessions: Arc<dyn SessionPort>,
    /// Reverse lookup from a character's object id to the owning account,
    /// used by `actor_has_role`. Characters are cheap to re-fetch; this
    /// avoids threading a session-id through every interpreter call.
    character_owner: dashmap::DashMap<ObjectId, AccountId>,
    /// Reverse lookup from an embodied character to its live session, so a
    /// `send` with no `on_message` defined still reaches the player.
    character_session: dashmap::DashMap<ObjectId, gaia_domain::SessionId>,
}

impl GameHost {
    pub fn new(
        cache: Arc<WorldCache>,
        accounts: Arc<dyn AccountRepositoryPort>,
        sessions: Arc<dyn SessionPort>,
    ) -> Self {
        Self {
            cache,
            accounts,
            sessions,
            character_owner: dashmap::DashMap::new(),
            character_session: dashmap::DashMap::new(),
        }
    }

    pub fn remember_owner(&self, character: ObjectId, account: AccountId) {
        self.character_owner.insert(character, account);
    }

    /// Called by the embody use case when a session takes control of a
    /// character, and on disembody/disconnect to remove the mapping.
    pub fn bind_session(&self, character: ObjectId, session: gaia_domain::SessionId) {
        self.character_session.insert(character, session);
    }

    pub fn unbind_session(&self, character: &ObjectId) {
        self.character_session.remove(character);
    }

    fn store_error(err: gaia_ports::StoreError) -> GError {
        match err {
            gaia_ports::StoreError::NotFound { entity, id } => GError::not_found(format!("{entity} {id}")),
            other => GError::not_found(other.to_string()),
        }
    }
}

#[async_trait]
impl Host for GameHost {
    async fn get_attr(&self, object: &ObjectId, name: &str) -> Result<Option<GValue>, GError> {
        self.cache.get_attribute(object, name).await.map_err(Self::store_error)
    }

    async fn set_attr(&self, object: &ObjectId, name: &str, value: GValue) -> Result<(), GError> {
        self.cache
            .set_attribute(object, name, value)
            .await
            .map_err(Self::store_error)
    }

    async fn get_object(&self, reference: &str, ctx: &EvalContext) -> Result<ObjectId, GError> {
        match reference {
            "@this" => Ok(ctx.this.clone()),
            "@actor" => Ok(ctx.actor.clone()),
            "@executor" => Ok(ctx.executor.clone()),
            other => {
                let id = ObjectId::new(other.trim_start_matches('@'));
                self.cache.get(&id).await.map_err(Self::store_error)?;
                Ok(id)
            }
        }
    }

    async fn send(&self, target: &ObjectId, payload: GValue) -> Result<(), GError> {
        // `on_message` is resolved through the same inheritance BFS as any
        // other attribute: an inherited `on_message` fires, it need not be
        // defined directly on the target.
        match self.get_attr(target, "on_message").await? {
            Some(GValue::Source(source)) | Some(GValue::String(source)) if !source.is_empty() => {
                let parsed = gaia_glang::parse(&source)?;
                let mut child = EvalContext::top_level(target.clone(), target.clone(), target.clone());
                child.define("message", payload);
                match Box::pin(gaia_glang::eval(&parsed, &mut child, self)).await {
                    Ok(_) | Err(gaia_glang::Signal::Return(_)) => Ok(()),
                    Err(gaia_glang::Signal::Error(err)) => Err(err),
                }
            }
            _ => {
                if let Some(session) = self.session_for(target) {
                    let _ = self.sessions.send_event(&session, &payload.to_gstring()).await;
                }
                Ok(())
            }
        }
    }

    fn log(&self, message: &str) {
        info!(target: "gaia::glang", "{message}");
    }

    async fn load(
        &self,
        path: &str,
        target: &ObjectId,
        attr_name: &str,
        ctx: &EvalContext,
    ) -> Result<(), GError> {
        // Administrator-only; enforced by the pipeline refusing to reach
        // this path outside an Admin-mode `/reload` command, not by a
        // caller-role check here — `set_attr`/`load` trust the caller's
        // gate rather than re-checking privilege themselves.
        let _ = ctx;
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| GError::not_found(format!("cannot read {path}: {err}")))?;
        self.set_attr(target, attr_name, GValue::Source(source)).await
    }

    async fn actor_has_role(&self, actor: &ObjectId, role: &str) -> Result<bool, GError> {
        let Some(account_id) = self.character_owner.get(actor).map(|e| *e.value()) else {
            return Ok(false);
        };
        let account = self
            .accounts
            .fetch(&account_id)
            .await
            .map_err(Self::store_error)?;
        let required = match role {
            "player" => Role::Player,
            "builder" => Role::Builder,
            "wizard" => Role::Wizard,
            "admin" => Role::Admin,
            _ => return Ok(false),
        };
        Ok(account.highest_role() >= required)
    }
}

impl GameHost {
    pub fn session_for(&self, character: &ObjectId) -> Option<gaia_domain::SessionId> {
        self.character_session.get(character).map(|e| *e.value())
    }
}
