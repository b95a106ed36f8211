//! Wires concrete adapters into `gaia-app`'s ports and builds an
//! [`AppState`]. Grounded on the construction sequence the teacher's
//! `engine-runner`'s composition module follows: connect storage, build the
//! service layer on top of it, hand the result to the runner.

use std::path::Path;
use std::sync::Arc;

use gaia_adapters::{AppConfig, SessionRegistry, SqliteAccountStore, SqliteWorldStore};
use gaia_app::{
    accounts::new_password_hash, AccountUseCases, GameHost, Pipeline, SessionStore, TickScheduler, WorldCache,
};
use gaia_domain::{Account, Role};
use gaia_ports::{AccountRepositoryPort, SessionPort, StoreError, WorldStorePort};
use thiserror::Error;
use tracing::info;

use crate::app_state::AppState;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("loading world files from {path}: {source}")]
    WorldLoad { path: String, #[source] source: gaia_adapters::WorldLoadError },
}

/// Builds every service the server needs from an [`AppConfig`]: connects the
/// SQLite stores, loads the world-file tree, seeds the default admin
/// account if none exists, and assembles the result into an [`AppState`].
pub async fn bootstrap(config: &AppConfig) -> Result<AppState, BootstrapError> {
    let pool = gaia_adapters::connect(&config.database_url).await?;
    let world_store: Arc<dyn WorldStorePort> = Arc::new(SqliteWorldStore::new(pool.clone()).await?);
    let account_store: Arc<dyn AccountRepositoryPort> = Arc::new(SqliteAccountStore::new(pool).await?);

    let cache = Arc::new(WorldCache::new(world_store).with_dirty_threshold(config.dirty_threshold));

    let world_files_dir = Path::new(&config.world_files_dir);
    if world_files_dir.exists() {
        let count = gaia_adapters::load_directory(world_files_dir, &cache)
            .await
            .map_err(|source| BootstrapError::WorldLoad { path: config.world_files_dir.clone(), source })?;
        info!(count, dir = %config.world_files_dir, "loaded world files");
    } else {
        info!(dir = %config.world_files_dir, "world files directory does not exist, starting with an empty world");
    }

    seed_default_admin(&account_store, &config.default_admin_login, &config.default_admin_password).await?;

    let registry = Arc::new(SessionRegistry::new());
    let transport: Arc<dyn SessionPort> = registry.clone();

    let host = Arc::new(GameHost::new(cache.clone(), account_store.clone(), transport.clone()));
    let sessions = Arc::new(SessionStore::new(cache.clone()));
    let account_uc = Arc::new(AccountUseCases::new(account_store.clone(), transport.clone(), host.clone()));

    let pipeline = Arc::new(Pipeline::new(cache.clone(), host.clone(), sessions, account_uc, account_store.clone(), transport));

    register_global_commands(&pipeline, &cache).await;

    let tick_scheduler = Arc::new(
        TickScheduler::new(cache.clone(), host).with_interval(std::time::Duration::from_millis(config.tick_interval_ms)),
    );

    Ok(AppState { pipeline, registry, cache, tick_scheduler })
}

/// Registers every `cmd_<verb>` attribute defined directly on the global
/// commands object so the Game recognizer accepts it, matching the last
/// entry in `Binder`'s search chain. Also registers any `synonym_<verb>`
/// attribute (its string value is the canonical verb) as a synonym, so
/// e.g. `synonym_get` = `"take"` makes `get` resolve to `cmd_take`.
async fn register_global_commands(pipeline: &Pipeline, cache: &WorldCache) {
    let commands_object = gaia_domain::ObjectId::new(gaia_app::GLOBAL_COMMANDS_OBJECT);
    let Ok(object) = cache.get(&commands_object).await else {
        return;
    };
    for (name, value) in &object.attributes {
        if let Some(verb) = name.strip_prefix("cmd_") {
            pipeline.register_game_verb(verb.to_string());
        } else if let Some(synonym) = name.strip_prefix("synonym_") {
            pipeline.register_synonym(synonym.to_string(), value.to_gstring());
        }
    }
}

async fn seed_default_admin(
    accounts: &Arc<dyn AccountRepositoryPort>,
    login: &str,
    password: &str,
) -> Result<(), StoreError> {
    match accounts.fetch_by_login(login).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound { .. }) => {
            let mut account = Account::new(login, new_password_hash(password));
            account.roles.insert(Role::Admin);
            account.display_name = login.to_string();
            accounts.store(&account, None).await?;
            info!(%login, "seeded default admin account");
            Ok(())
        }
        Err(other) => Err(other),
    }
}
