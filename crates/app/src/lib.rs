//! Application layer: the world cache, the G-language host bridge, the
//! input recognizer/binder pipeline, the tick scheduler, and the account
//! use cases the input pipeline needs. No transport or storage concerns
//! live here; those are `gaia-adapters`, wired together in
//! `gaia-composition`.

pub mod accounts;
pub mod binder;
pub mod host_bridge;
pub mod pipeline;
pub mod recognizer;
pub mod session_store;
pub mod tick_scheduler;
pub mod world_cache;

#[cfg(test)]
mod test_support;

pub use accounts::{AccountUseCases, MAX_FAILED_LOGINS};
pub use binder::{BindResult, Binder, GLOBAL_COMMANDS_OBJECT};
pub use host_bridge::GameHost;
pub use pipeline::{Pipeline, DEFAULT_NOT_UNDERSTOOD};
pub use recognizer::{
    recognizer_stack, AdminRecognizer, CommandTable, GameRecognizer, Mode, Recognition,
    RecognitionContext, Recognizer, RecognizerOutcome, SynonymTable, UserRecognizer,
};
pub use session_store::{SessionStore, TRANSIENT_USER_PARENT};
pub use tick_scheduler::{TickScheduler, DEFAULT_TICK_INTERVAL, ON_TICK_INDEX};
pub use world_cache::WorldCache;
