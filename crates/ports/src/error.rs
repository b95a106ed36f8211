//! Shared error plumbing: a stable wire code per failure kind, and the
//! top-level `EngineError` aggregate returned by adapters.

use thiserror::Error;

/// Implemented by every use-case error enum so transports can map a
/// failure to a stable string without matching on the concrete variant.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}

/// Shared failure kinds, used across the store adapter, the interpreter
/// bridge, and the transport layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    GLang(#[from] gaia_glang::GError),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store conflict on {0} after retry")]
    StoreConflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("fatal startup error: {0}")]
    Startup(#[source] anyhow::Error),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            EngineError::GLang(e) => e.code(),
            EngineError::Permission(_) => "PERMISSION",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::StoreConflict(_) => "STORE_CONFLICT",
            EngineError::Transport(_) => "TRANSPORT",
            EngineError::Protocol(_) => "PROTOCOL",
            EngineError::Startup(_) => "STARTUP",
        }
    }
}
