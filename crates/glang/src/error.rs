//! Failure kinds raised by the lexer, parser and interpreter.
//!
//! Every G-level failure carries a human-readable reason and, where one
//! applies, the source span of the failing expression — both are needed to
//! produce the single-line diagnostic the binder reports back to the actor.

use thiserror::Error;

use crate::lexer::Span;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GError {
    #[error("parse failure: {reason}")]
    ParseFailure { reason: String, span: Span },

    #[error("unresolved callee: {name}")]
    UnresolvedCallee { name: String, span: Span },

    #[error("type coercion failure: {reason}")]
    TypeCoercion { reason: String, span: Span },

    #[error("permission denied: {reason}")]
    Permission { reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("execution timed out")]
    Timeout,

    #[error("call depth limit exceeded")]
    DepthLimit,
}

impl GError {
    pub fn parse_failure(reason: impl Into<String>, span: Span) -> Self {
        Self::ParseFailure {
            reason: reason.into(),
            span,
        }
    }

    pub fn unresolved_callee(name: impl Into<String>, span: Span) -> Self {
        Self::UnresolvedCallee {
            name: name.into(),
            span,
        }
    }

    pub fn type_coercion(reason: impl Into<String>, span: Span) -> Self {
        Self::TypeCoercion {
            reason: reason.into(),
            span,
        }
    }

    pub fn permission(reason: impl Into<String>) -> Self {
        Self::Permission {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, mirrored onto `gaia-ports`'s
    /// `ErrorCode` mapping for use-case errors.
    pub fn code(&self) -> &'static str {
        match self {
            GError::ParseFailure { .. } => "PARSE_FAILURE",
            GError::UnresolvedCallee { .. } => "UNRESOLVED_CALLEE",
            GError::TypeCoercion { .. } => "TYPE_COERCION",
            GError::Permission { .. } => "PERMISSION",
            GError::NotFound { .. } => "NOT_FOUND",
            GError::Timeout => "TIMEOUT",
            GError::DepthLimit => "DEPTH_LIMIT",
        }
    }
}
