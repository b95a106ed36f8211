pub mod use_case_errors;

pub use use_case_errors::{AdminCommandError, AuthError, EmbodyError};
