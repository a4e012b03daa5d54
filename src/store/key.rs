//! Index key coercion
//!
//! Every index maps stringified key values to positions. One coercion
//! function is shared by the path resolver and by query operands, so a
//! record's indexed value and the value a caller queries with always meet
//! in the same representation.

use std::fmt;

use serde_json::Value;

/// A stringified index key.
///
/// A missing field and an explicit JSON `null` leaf both coerce to the
/// canonical [`Key::Absent`] sentinel, which is distinct from every real
/// key value (including the literal strings `"null"` and `"undefined"`).
/// Absence is therefore queryable by passing a JSON `null` literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// The field was missing or explicitly `null`.
    Absent,
    /// A present value in its canonical text form.
    Text(String),
}

impl Key {
    /// Coerces a JSON value into its key form.
    ///
    /// Strings keep their text, numbers and booleans use their canonical
    /// display form, arrays and objects use their compact JSON text.
    pub fn coerce(value: &Value) -> Key {
        match value {
            Value::Null => Key::Absent,
            Value::String(s) => Key::Text(s.clone()),
            Value::Number(n) => Key::Text(n.to_string()),
            Value::Bool(b) => Key::Text(b.to_string()),
            other => Key::Text(other.to_string()),
        }
    }

    /// Coerces a resolved leaf, where `None` marks a missing value.
    pub fn from_leaf(leaf: Option<&Value>) -> Key {
        match leaf {
            None => Key::Absent,
            Some(value) => Key::coerce(value),
        }
    }

    /// Builds a text key directly.
    pub fn text(value: impl Into<String>) -> Key {
        Key::Text(value.into())
    }

    /// Returns true for the absent sentinel.
    pub fn is_absent(&self) -> bool {
        matches!(self, Key::Absent)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Absent => f.write_str("<absent>"),
            Key::Text(s) => f.write_str(s),
        }
    }
}
