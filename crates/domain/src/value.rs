//! `GValue`: the dynamically-typed value carried by object attributes and by
//! every expression the G interpreter evaluates.
//!
//! GAIA is string-centric: any value can be coerced to a string for display
//! or concatenation, and most scalars can be parsed back out of a string.
//! `GValue` keeps the richer shapes (sequences, maps, object references,
//! unevaluated source) available to code that wants them, while `to_gstring`
//! gives every variant a canonical textual form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum GValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// An ordered list of values. The spec treats the empty sequence and the
    /// empty string as equivalent in boolean context (see `is_truthy`).
    Sequence(Vec<GValue>),
    /// An unordered string-keyed map, used by builtins that return or accept
    /// structured data (e.g. `attribs`).
    Map(Vec<(String, GValue)>),
    /// A reference to another object, distinct from a bare string so the
    /// interpreter can dereference it without re-parsing an id out of text.
    ObjectRef(ObjectId),
    /// Unevaluated G source, used for attributes that hold code (commands,
    /// listeners) rather than data.
    Source(String),
}

impl GValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Boolean coercion: `false`, `0`, the empty string, the empty sequence
    /// and `null` are false; everything else, including whitespace-only
    /// strings and non-zero numbers (positive or negative), is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            GValue::Null => false,
            GValue::Boolean(b) => *b,
            GValue::Number(n) => *n != 0.0,
            GValue::String(s) => !s.is_empty(),
            GValue::Sequence(items) => !items.is_empty(),
            GValue::Map(entries) => !entries.is_empty(),
            GValue::ObjectRef(_) => true,
            GValue::Source(s) => !s.is_empty(),
        }
    }

    /// Canonical string form used for concatenation, display, and
    /// attribute-value parsing round-trips.
    pub fn to_gstring(&self) -> String {
        match self {
            GValue::Null => String::new(),
            GValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            GValue::Number(n) => format_number(*n),
            GValue::String(s) => s.clone(),
            GValue::Sequence(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(GValue::to_gstring)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            GValue::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{k}={}", v.to_gstring()))
                .collect::<Vec<_>>()
                .join(","),
            GValue::ObjectRef(id) => id.to_string(),
            GValue::Source(s) => s.clone(),
        }
    }

    /// Attempt to parse the value as a number, following the coercion rule
    /// that a numeric-looking string is treated as its number for arithmetic
    /// and comparison operators.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            GValue::Number(n) => Some(*n),
            GValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            GValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for GValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_gstring())
    }
}

impl From<&str> for GValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for GValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for GValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for GValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_is_falsy_like_empty_string() {
        assert!(!GValue::Sequence(Vec::new()).is_truthy());
        assert!(!GValue::string("").is_truthy());
    }

    #[test]
    fn whitespace_only_string_is_truthy() {
        assert!(GValue::string("   ").is_truthy());
    }

    #[test]
    fn negative_number_is_truthy() {
        assert!(GValue::Number(-4.0).is_truthy());
    }

    #[test]
    fn sequence_renders_bracketed_and_space_joined() {
        let seq = GValue::Sequence(vec![GValue::string("a"), GValue::string("b")]);
        assert_eq!(seq.to_gstring(), "[a b]");
    }

    #[test]
    fn boolean_renders_as_true_or_false() {
        assert_eq!(GValue::Boolean(true).to_gstring(), "true");
        assert_eq!(GValue::Boolean(false).to_gstring(), "false");
    }

    #[test]
    fn integral_number_formats_without_decimal() {
        assert_eq!(GValue::Number(3.0).to_gstring(), "3");
        assert_eq!(GValue::Number(3.5).to_gstring(), "3.5");
    }

    #[test]
    fn numeric_string_coerces_to_number() {
        assert_eq!(GValue::string("42").as_number(), Some(42.0));
        assert_eq!(GValue::string("abc").as_number(), None);
    }
}
