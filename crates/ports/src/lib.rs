//! Port traits: the seams between the domain/G-language core and the
//! concrete adapters (document store, transports, clock) that `gaia-app`
//! is wired to in `gaia-composition`.

pub mod error;
pub mod inbound;
pub mod outbound;

pub use error::{EngineError, ErrorCode};
pub use inbound::{AdminCommandError, AuthError, EmbodyError};
pub use outbound::{
    AccountRepositoryPort, ClockPort, RandomPort, SessionError, SessionPort, StoreError, SystemClock,
    SystemRandom, WorldStorePort,
};
