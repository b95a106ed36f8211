//! Ties the recognizer stack, the binder, and the G interpreter into a
//! single per-line entry point, plus the fixed set of in-engine handlers
//! (login, quit, who, commands, and the `/`-prefixed admin commands) that
//! Admin/User mode recognitions resolve to.
//!
//! No teacher analogue (the teacher has no natural-language input loop);
//! grounded on the same dispatch-by-recognition shape as `recognizer.rs`
//! and `binder.rs`, composed here the way `websocket/dispatch.rs` composes
//! its own handler modules behind one `handle_message` entry point.

use std::sync::Arc;

use gaia_domain::{Account, GValue, Object, ObjectId, Role, Session};
use gaia_glang::interpreter::EvalContext;
use gaia_glang::{parse, Signal};
use gaia_ports::{AccountRepositoryPort, SessionPort};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::accounts::{AccountUseCases, MAX_FAILED_LOGINS};
use crate::binder::{BindResult, Binder};
use crate::host_bridge::GameHost;
use crate::recognizer::{
    recognizer_stack, AdminRecognizer, CommandTable, GameRecognizer, Mode, Recognition,
    RecognitionContext, Recognizer, RecognizerOutcome, SynonymTable, UserRecognizer,
};
use crate::session_store::SessionStore;
use crate::world_cache::WorldCache;

/// Fallback reply when nothing in the recognizer stack accepts a line.
pub const DEFAULT_NOT_UNDERSTOOD: &str = "I don't understand that.";

const ADMIN_COMMANDS: &[&str] = &["create", "delete", "reload", "shutdown", "password", "roles", "eval"];

pub struct Pipeline {
    cache: Arc<WorldCache>,
    host: Arc<GameHost>,
    sessions: Arc<SessionStore>,
    account_uc: Arc<AccountUseCases>,
    accounts: Arc<dyn AccountRepositoryPort>,
    transport: Arc<dyn SessionPort>,
    admin: AdminRecognizer,
    user: UserRecognizer,
    game: GameRecognizer,
    synonyms: SynonymTable,
    /// Cancelled by the `/shutdown` admin command; the composition root
    /// watches this alongside its own SIGTERM/Ctrl+C handling.
    pub shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(
        cache: Arc<WorldCache>,
        host: Arc<GameHost>,
        sessions: Arc<SessionStore>,
        account_uc: Arc<AccountUseCases>,
        accounts: Arc<dyn AccountRepositoryPort>,
        transport: Arc<dyn SessionPort>,
    ) -> Self {
        Self {
            cache,
            host,
            sessions,
            account_uc,
            accounts,
            transport,
            admin: AdminRecognizer { commands: CommandTable::new(ADMIN_COMMANDS.iter().map(|s| s.to_string())) },
            user: UserRecognizer::with_defaults(),
            game: GameRecognizer::new(CommandTable::default()),
            synonyms: SynonymTable::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a verb recognized by the Game recognizer (`cmd_<verb>`
    /// attributes on world objects become reachable this way).
    pub fn register_game_verb(&self, verb: impl Into<String>) {
        self.game.verbs.register(verb);
    }

    /// Registers `synonym` so the binder also tries `canonical`'s
    /// `cmd_<canonical>` attribute whenever a player types `synonym`.
    pub fn register_synonym(&self, synonym: impl Into<String>, canonical: impl Into<String>) {
        self.synonyms.register(synonym, canonical);
    }

    pub fn on_connect(&self, session: gaia_domain::SessionId) {
        self.sessions.connect(session);
    }

    pub fn on_disconnect(&self, session: &gaia_domain::SessionId) {
        if let Some(character) = self.sessions.get(session).and_then(|s| s.character_id) {
            self.host.unbind_session(&character);
        }
        self.sessions.disconnect(session);
    }

    pub async fn handle_line(&self, session_id: gaia_domain::SessionId, raw_line: &str) {
        self.sessions.touch(&session_id);
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };

        if !session.is_admin() {
            self.handle_unauthenticated(session_id, raw_line).await;
            return;
        }

        let actor = self.sessions.actor_of(&session_id);
        let location = self.location_of(&actor).await;
        let ctx = RecognitionContext { actor: actor.clone(), location: location.clone(), cache: self.cache.as_ref() };

        let stack = recognizer_stack(&self.admin, &self.user, &self.game, session.is_admin(), session.is_embodied());
        for recognizer in stack {
            match recognizer.recognize(raw_line, &ctx).await {
                RecognizerOutcome::NotRecognized => continue,
                RecognizerOutcome::Disambiguate { candidates, .. } => {
                    self.reply(&session_id, &format!("Which one? {} candidates.", candidates.len())).await;
                    return;
                }
                RecognizerOutcome::Recognized(recognition) => {
                    self.dispatch(session_id, &session, &actor, &location, recognition).await;
                    return;
                }
            }
        }
        self.reply(&session_id, DEFAULT_NOT_UNDERSTOOD).await;
    }

    async fn dispatch(
        &self,
        session_id: gaia_domain::SessionId,
        session: &Session,
        actor: &ObjectId,
        location: &ObjectId,
        recognition: Recognition,
    ) {
        match recognition.mode {
            Mode::Admin | Mode::User => {
                self.handle_engine_command(session_id, session, &recognition.verb, &recognition.args).await;
            }
            Mode::Game => {
                let binder = Binder::new(self.cache.as_ref(), &self.synonyms);
                let transient = self.sessions.transient_user(&session_id);
                let bound = binder.bind(&recognition, actor, location, Some(&transient)).await;
                match bound {
                    BindResult::GameInvocation { executor, attr, args } => {
                        self.invoke_game(session_id, actor, &executor, &attr, &args).await;
                    }
                    BindResult::EngineHandler { verb, args } => {
                        self.handle_engine_command(session_id, session, &verb, &args).await;
                    }
                    BindResult::NotFound => {
                        self.reply(&session_id, "You can't do that.").await;
                    }
                }
            }
        }
    }

    async fn invoke_game(&self, session_id: gaia_domain::SessionId, actor: &ObjectId, executor: &ObjectId, attr: &str, args: &str) {
        let source = match self.cache.get_attribute(executor, attr).await {
            Ok(Some(value)) => value.to_gstring(),
            Ok(None) => {
                self.reply(&session_id, "You can't do that.").await;
                return;
            }
            Err(err) => {
                warn!(error = %err, "command lookup failed");
                self.reply(&session_id, "Something went wrong.").await;
                return;
            }
        };

        let node = match parse(&source) {
            Ok(node) => node,
            Err(err) => {
                self.reply(&session_id, &format!("{}: {}", err.code(), source)).await;
                return;
            }
        };

        let mut eval_ctx = EvalContext::top_level(executor.clone(), actor.clone(), executor.clone());
        eval_ctx.define("args", GValue::string(args));

        match gaia_glang::eval(&node, &mut eval_ctx, self.host.as_ref()).await {
            Ok(GValue::Null) => {}
            Ok(value) => self.reply(&session_id, &value.to_gstring()).await,
            Err(Signal::Return(GValue::Null)) => {}
            Err(Signal::Return(value)) => self.reply(&session_id, &value.to_gstring()).await,
            Err(Signal::Error(err)) => {
                debug!(error = %err, %source, "command invocation failed");
                self.reply(&session_id, &format!("{}: {}", err.code(), source)).await;
            }
        }
    }

    async fn handle_unauthenticated(&self, session_id: gaia_domain::SessionId, raw_line: &str) {
        let trimmed = raw_line.trim();
        let mut parts = trimmed.split_whitespace();
        let Some(keyword) = parts.next() else { return };
        if !keyword.eq_ignore_ascii_case("connect") {
            self.reply(&session_id, "You must connect first: connect <user> <password>").await;
            return;
        }
        let login = parts.next().unwrap_or_default();
        let password = parts.next().unwrap_or_default();
        if login.is_empty() || password.is_empty() {
            self.reply(&session_id, "Usage: connect <user> <password>").await;
            return;
        }

        match self.account_uc.authenticate(login, password).await {
            Ok(account) => {
                self.sessions.authenticate(&session_id, account.id);
                self.reply(&session_id, &format!("Welcome, {}.", account.display_name)).await;
            }
            Err(_) => {
                let attempts = self.sessions.record_failed_login(&session_id);
                if attempts >= MAX_FAILED_LOGINS {
                    let _ = self.transport.disconnect(&session_id, Some("Too many failed login attempts.")).await;
                } else {
                    self.reply(&session_id, "Login incorrect.").await;
                }
            }
        }
    }

    async fn handle_engine_command(&self, session_id: gaia_domain::SessionId, session: &Session, verb: &str, args: &str) {
        match verb {
            "quit" => {
                let _ = self.transport.disconnect(&session_id, Some("Goodbye.")).await;
            }
            "who" => {
                let lines: Vec<String> = self
                    .transport
                    .connected_sessions()
                    .into_iter()
                    .map(|id| {
                        let name = self.transport.connection_name(&id).unwrap_or_else(|| "unknown".to_string());
                        let idle = self.transport.idle_seconds(&id).unwrap_or(0);
                        format!("{name} (idle {idle}s)")
                    })
                    .collect();
                self.reply(&session_id, &lines.join("\n")).await;
            }
            "commands" => {
                let verbs = self.game.verbs.snapshot();
                let mut listed: Vec<&str> = verbs.iter().map(String::as_str).collect();
                listed.sort_unstable();
                self.reply(&session_id, &listed.join(", ")).await;
            }
            "connect" => self.handle_connect_character(session_id, session, args).await,
            "create" => self.handle_create(session_id, session, args).await,
            "delete" => self.handle_delete(session_id, session, args).await,
            "reload" => self.handle_reload(session_id, session, args).await,
            "shutdown" => self.handle_shutdown(session_id, session).await,
            "password" => self.handle_password(session_id, session, args).await,
            "roles" => self.handle_roles(session_id, session, args).await,
            "eval" => self.handle_eval(session_id, args).await,
            _ => self.reply(&session_id, DEFAULT_NOT_UNDERSTOOD).await,
        }
    }

    async fn handle_connect_character(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let name = args.strip_prefix("character").map(str::trim).unwrap_or(args.trim());
        if name.is_empty() {
            self.reply(&session_id, "Usage: connect character <name>").await;
            return;
        }
        let Some(account_id) = session.account_id else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        let account = match self.accounts.fetch(&account_id).await {
            Ok(account) => account,
            Err(_) => {
                self.reply(&session_id, "Account lookup failed.").await;
                return;
            }
        };
        let character = ObjectId::new(name);
        match self.account_uc.embody(&account, &character, session_id).await {
            Ok(_displaced) => {
                self.sessions.embody(&session_id, character);
                self.reply(&session_id, &format!("You are now {name}.")).await;
            }
            Err(err) => self.reply(&session_id, &err.to_string()).await,
        }
    }

    fn require_role(&self, account: &Account, role: Role) -> bool {
        account.highest_role() >= role
    }

    async fn require_account(&self, session: &Session) -> Option<Account> {
        let account_id = session.account_id?;
        self.accounts.fetch(&account_id).await.ok()
    }

    async fn handle_create(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let Some(account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Builder) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        let mut parts = args.split_whitespace();
        let Some(display_name) = parts.next() else {
            self.reply(&session_id, "Usage: /create <name> [parent...]").await;
            return;
        };
        let parents: Vec<ObjectId> = parts.map(ObjectId::new).collect();
        let id = ObjectId::generate("obj");
        let object = Object::new(id.clone(), display_name).with_parents(parents);
        self.cache.put(object);
        self.reply(&session_id, &format!("Created {id}.")).await;
    }

    async fn handle_delete(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let Some(account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Builder) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        let id = ObjectId::new(args.trim());
        match self.cache.delete(&id).await {
            Ok(()) => self.reply(&session_id, &format!("Deleted {id}.")).await,
            Err(err) => self.reply(&session_id, &err.to_string()).await,
        }
    }

    async fn handle_reload(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let Some(account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Admin) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        let mut parts = args.split_whitespace();
        let (Some(path), Some(reference)) = (parts.next(), parts.next()) else {
            self.reply(&session_id, "Usage: /reload <path> <ref>").await;
            return;
        };
        let target = ObjectId::new(reference);
        let ctx = EvalContext::top_level(target.clone(), target.clone(), target.clone());
        // `/reload <path> <ref>` always targets the conventional `source`
        // attribute; a file that should populate a different attribute is
        // loaded through the G-level `load` builtin instead, which takes the
        // attribute name explicitly.
        match gaia_glang::Host::load(self.host.as_ref(), path, &target, "source", &ctx).await {
            Ok(()) => self.reply(&session_id, &format!("Reloaded {reference} from {path}.")).await,
            Err(err) => self.reply(&session_id, &err.to_string()).await,
        }
    }

    async fn handle_shutdown(&self, session_id: gaia_domain::SessionId, session: &Session) {
        let Some(account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Admin) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        self.reply(&session_id, "Server is shutting down.").await;
        self.shutdown.cancel();
    }

    async fn handle_password(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let Some(mut account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Admin) && args.split_whitespace().next() != Some(&account.login) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        let mut parts = args.split_whitespace();
        let (Some(_login), Some(new_password)) = (parts.next(), parts.next()) else {
            self.reply(&session_id, "Usage: /password <user> <new-password>").await;
            return;
        };
        account.password_hash = crate::accounts::new_password_hash(new_password);
        match self.accounts.store(&account, account.revision.as_ref()).await {
            Ok(_) => self.reply(&session_id, "Password updated.").await,
            Err(err) => self.reply(&session_id, &err.to_string()).await,
        }
    }

    async fn handle_roles(&self, session_id: gaia_domain::SessionId, session: &Session, args: &str) {
        let Some(account) = self.require_account(session).await else {
            self.reply(&session_id, "You must connect first.").await;
            return;
        };
        if !self.require_role(&account, Role::Admin) {
            self.reply(&session_id, "Permission denied.").await;
            return;
        }
        let mut parts = args.split_whitespace();
        let Some(login) = parts.next() else {
            self.reply(&session_id, "Usage: /roles <user> +role -role...").await;
            return;
        };
        let Ok(mut target) = self.accounts.fetch_by_login(login).await else {
            self.reply(&session_id, &format!("No such account: {login}")).await;
            return;
        };
        for token in parts {
            if let Some(name) = token.strip_prefix('+') {
                if let Some(role) = parse_role(name) {
                    target.roles.insert(role);
                }
            } else if let Some(name) = token.strip_prefix('-') {
                if let Some(role) = parse_role(name) {
                    target.roles.remove(&role);
                }
            }
        }
        match self.accounts.store(&target, target.revision.as_ref()).await {
            Ok(_) => self.reply(&session_id, &format!("Updated roles for {login}.")).await,
            Err(err) => self.reply(&session_id, &err.to_string()).await,
        }
    }

    /// `/eval <expr>`, Admin-only: evaluates arbitrary G source as the
    /// session's own actor. Not part of the external admin command list;
    /// exists so failure diagnostics (unresolved callee, naming the failing
    /// span) are reachable from the live session for testing and operator
    /// debugging.
    async fn handle_eval(&self, session_id: gaia_domain::SessionId, args: &str) {
        let actor = self.sessions.actor_of(&session_id);
        let node = match parse(args) {
            Ok(node) => node,
            Err(err) => {
                self.reply(&session_id, &format!("{}: {}", err.code(), args)).await;
                return;
            }
        };
        let mut ctx = EvalContext::top_level(actor.clone(), actor.clone(), actor.clone());
        match gaia_glang::eval(&node, &mut ctx, self.host.as_ref()).await {
            Ok(value) => self.reply(&session_id, &value.to_gstring()).await,
            Err(Signal::Return(value)) => self.reply(&session_id, &value.to_gstring()).await,
            Err(Signal::Error(err)) => self.reply(&session_id, &format!("{}: {}", err.code(), args)).await,
        }
    }

    async fn location_of(&self, actor: &ObjectId) -> ObjectId {
        match self.cache.get(actor).await {
            Ok(object) => object.location.unwrap_or_else(|| actor.clone()),
            Err(_) => actor.clone(),
        }
    }

    async fn reply(&self, session_id: &gaia_domain::SessionId, text: &str) {
        let _ = self.transport.send_event(session_id, text).await;
    }
}

fn parse_role(name: &str) -> Option<Role> {
    match name.to_lowercase().as_str() {
        "player" => Some(Role::Player),
        "builder" => Some(Role::Builder),
        "wizard" => Some(Role::Wizard),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullStore;
    use async_trait::async_trait;
    use gaia_domain::{AccountId, GValue as GV, Revision, SessionId};
    use gaia_ports::StoreError;
    use std::sync::Mutex as StdMutex;

    struct FakeAccounts(StdMutex<Vec<Account>>);

    #[async_trait]
    impl AccountRepositoryPort for FakeAccounts {
        async fn fetch(&self, id: &AccountId) -> Result<Account, StoreError> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .find(|a| &a.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound { entity: "account", id: id.to_string() })
        }
        async fn fetch_by_login(&self, login: &str) -> Result<Account, StoreError> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.login == login)
                .cloned()
                .ok_or_else(|| StoreError::NotFound { entity: "account", id: login.to_string() })
        }
        async fn store(&self, account: &Account, _prior: Option<&Revision>) -> Result<Revision, StoreError> {
            let mut accounts = self.0.lock().unwrap();
            accounts.retain(|a| a.id != account.id);
            accounts.push(account.clone());
            Ok(Revision::new("1"))
        }
        async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
            Ok(self.0.lock().unwrap().iter().filter(|a| a.roles.contains(&role)).cloned().collect())
        }
    }

    struct RecordingSessions(StdMutex<Vec<(SessionId, String)>>);

    #[async_trait]
    impl SessionPort for RecordingSessions {
        async fn send_event(&self, session: &SessionId, text: &str) -> Result<(), gaia_ports::SessionError> {
            self.0.lock().unwrap().push((*session, text.to_string()));
            Ok(())
        }
        async fn send_system_msg(&self, session: &SessionId, text: &str) -> Result<(), gaia_ports::SessionError> {
            self.send_event(session, text).await
        }
        async fn disconnect(&self, _session: &SessionId, _reason: Option<&str>) -> Result<(), gaia_ports::SessionError> {
            Ok(())
        }
        fn connection_name(&self, _session: &SessionId) -> Option<String> {
            None
        }
        fn connected_seconds(&self, _session: &SessionId) -> Option<i64> {
            None
        }
        fn idle_seconds(&self, _session: &SessionId) -> Option<i64> {
            None
        }
        fn connected_sessions(&self) -> Vec<SessionId> {
            Vec::new()
        }
    }

    fn pipeline_with(objects: Vec<Object>, accounts: Vec<Account>) -> (Pipeline, Arc<RecordingSessions>) {
        let store: Arc<dyn gaia_ports::WorldStorePort> = Arc::new(NullStore);
        let cache = Arc::new(WorldCache::new(store));
        for obj in objects {
            cache.put(obj);
        }
        let accounts_repo: Arc<dyn AccountRepositoryPort> = Arc::new(FakeAccounts(StdMutex::new(accounts)));
        let sessions_port = Arc::new(RecordingSessions(StdMutex::new(Vec::new())));
        let host = Arc::new(GameHost::new(cache.clone(), accounts_repo.clone(), sessions_port.clone()));
        let sessions = Arc::new(SessionStore::new(cache.clone()));
        let account_uc = Arc::new(AccountUseCases::new(accounts_repo.clone(), sessions_port.clone(), host.clone()));
        let pipeline = Pipeline::new(cache, host, sessions, account_uc, accounts_repo, sessions_port.clone());
        (pipeline, sessions_port)
    }

    #[tokio::test]
    async fn unauthenticated_session_requires_connect() {
        let (pipeline, sessions) = pipeline_with(vec![], vec![]);
        let id = SessionId::new();
        pipeline.on_connect(id);
        pipeline.handle_line(id, "look").await;
        let log = sessions.0.lock().unwrap();
        assert!(log.iter().any(|(_, text)| text.contains("connect first")));
    }

    #[tokio::test]
    async fn successful_login_authenticates_the_session() {
        let account = Account::new("alice", crate::accounts::new_password_hash("secret"));
        let (pipeline, sessions) = pipeline_with(vec![], vec![account]);
        let id = SessionId::new();
        pipeline.on_connect(id);
        pipeline.handle_line(id, "connect alice secret").await;
        assert!(pipeline.sessions.get(&id).unwrap().is_admin());
        let log = sessions.0.lock().unwrap();
        assert!(log.iter().any(|(_, text)| text.starts_with("Welcome")));
    }

    #[tokio::test]
    async fn game_command_binds_and_invokes() {
        let mut room = Object::new(ObjectId::new("#r"), "a room");
        room.set_attribute("cmd_look", GV::Source("[send @actor [get_attr @executor \"description\"]]".into()));
        room.set_attribute("description", GV::string("A quiet room."));
        let account = Account::new("alice", crate::accounts::new_password_hash("secret"));
        let mut account = account;
        account.characters.push(ObjectId::new("#alice"));
        let (pipeline, sessions) = pipeline_with(vec![room], vec![account]);
        let id = SessionId::new();
        pipeline.on_connect(id);
        pipeline.handle_line(id, "connect alice secret").await;
        pipeline.handle_line(id, "connect character #alice").await;
        pipeline.cache.put(Object::new(ObjectId::new("#alice"), "alice").with_location(ObjectId::new("#r")));
        pipeline.handle_line(id, "look").await;
        let log = sessions.0.lock().unwrap();
        assert!(log.iter().any(|(_, text)| text == "A quiet room."));
    }
}
