//! Core types for GAIA: objects, accounts, sessions and the values that
//! flow between them. Nothing in this crate knows about storage, transport
//! or the G language's syntax — those live in `gaia-ports`/`gaia-adapters`
//! and `gaia-glang` respectively.

extern crate self as gaia_domain;

pub mod account;
pub mod common;
pub mod error;
pub mod ids;
pub mod object;
pub mod session;

pub use account::{Account, Role};
pub use error::DomainError;
pub use ids::{AccountId, ObjectId, Revision, SessionId};
pub use object::Object;
pub use session::{Session, SessionStage};
pub use value::GValue;

pub mod value;
