//! Composition root: wires concrete adapters into the port traits
//! `gaia-app` depends on and assembles the result into one [`AppState`].
//!
//! Grounded on `wrldbldr-engine-composition/src/app_state.rs`'s shape: a
//! single `Clone`-via-`Arc` struct holding `Arc<dyn Port>` fields plus the
//! concrete service types that sit behind them, built by one `AppState::new`
//! that the runner calls with already-constructed adapters. GAIA's port
//! surface is far smaller than the teacher's, so this carries one flat
//! struct rather than the teacher's `CoreServices`/`GameServices`/...
//! sub-containers.

mod app_state;
mod bootstrap;

pub use app_state::AppState;
pub use bootstrap::{bootstrap, BootstrapError};
