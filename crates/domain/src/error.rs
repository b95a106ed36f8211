//! Domain-level error type shared by every crate that manipulates raw
//! objects, accounts and values without reference to transport or storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("inheritance cycle detected at {0}")]
    InheritanceCycle(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn invalid_state_transition(message: impl Into<String>) -> Self {
        Self::InvalidStateTransition(message.into())
    }

    pub fn inheritance_cycle(object_id: impl Into<String>) -> Self {
        Self::InheritanceCycle(object_id.into())
    }
}
