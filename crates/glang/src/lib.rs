//! The G language: lexer, parser, tree-walking interpreter and standard
//! library. This crate knows nothing about transports or storage — it
//! reaches the world only through the [`Host`] port, which `gaia-app`
//! implements against the world cache.

pub mod error;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod stdlib;

pub use error::GError;
pub use host::Host;
pub use interpreter::{eval, EvalContext, Signal};
pub use parser::{parse, Node};
