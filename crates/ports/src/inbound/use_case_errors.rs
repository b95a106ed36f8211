//! One error type per use case, each paired with an `ErrorCode` impl so the
//! transport layer can report a stable code without matching on variants.
//!
//! Grounded on `wrldbldr-engine-ports/src/inbound/use_case_errors.rs`.

use thiserror::Error;

use crate::error::ErrorCode;
use crate::outbound::world_store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown login")]
    UnknownLogin,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("account locked after repeated failed logins")]
    AccountLocked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::UnknownLogin => "UNKNOWN_LOGIN",
            AuthError::IncorrectPassword => "INCORRECT_PASSWORD",
            AuthError::AccountLocked => "ACCOUNT_LOCKED",
            AuthError::Store(_) => "STORE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbodyError {
    #[error("account does not own character {0}")]
    NotOwned(String),

    #[error("character {0} not found")]
    CharacterNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for EmbodyError {
    fn code(&self) -> &'static str {
        match self {
            EmbodyError::NotOwned(_) => "NOT_OWNED",
            EmbodyError::CharacterNotFound(_) => "CHARACTER_NOT_FOUND",
            EmbodyError::Store(_) => "STORE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum AdminCommandError {
    #[error("unknown admin command: {0}")]
    UnknownCommand(String),

    #[error("permission denied for role requirement: {0}")]
    PermissionDenied(String),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for AdminCommandError {
    fn code(&self) -> &'static str {
        match self {
            AdminCommandError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            AdminCommandError::PermissionDenied(_) => "PERMISSION_DENIED",
            AdminCommandError::BadArguments(_) => "BAD_ARGUMENTS",
            AdminCommandError::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_codes_are_stable() {
        assert_eq!(AuthError::UnknownLogin.code(), "UNKNOWN_LOGIN");
        assert_eq!(AuthError::AccountLocked.code(), "ACCOUNT_LOCKED");
    }
}
