use std::sync::Arc;

use gaia_adapters::SharedSessionRegistry;
use gaia_app::{Pipeline, TickScheduler, WorldCache};

/// Shared application state — the composition root for the running server.
///
/// Grounded on `wrldbldr-engine-composition/src/app_state.rs`'s shape
/// (`Clone`-via-`Arc`, built once by [`crate::bootstrap`] and handed to
/// every transport). GAIA's port surface is small enough that one flat
/// struct suffices where the teacher groups services into sub-containers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub registry: SharedSessionRegistry,
    pub cache: Arc<WorldCache>,
    pub tick_scheduler: Arc<TickScheduler>,
}
