//! Nested-path value access and key resolution
//!
//! Index paths are dotted field references (`parentID.id`), optionally
//! containing fan-out segments (`parentID.$.id`): everything after a `.$.`
//! separator is resolved against every element of the intermediate array
//! and the per-element results are flattened one level.
//!
//! # Invariants
//!
//! - A `null` record yields no keys at all.
//! - A missing or `null` leaf yields the canonical absent key, which is
//!   distinct from every real key value.
//! - A plain array leaf contributes one key per element.

use serde_json::Value;

use crate::store::Key;

/// Separator marking a fan-out segment inside an index path.
pub const FAN_OUT: &str = ".$.";

/// Resolves a dotted path against a value.
///
/// Objects are walked by field name, arrays by numeric segment. Returns
/// `None` as soon as a segment cannot be resolved.
pub fn get_path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in dotted.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves every key value a record contributes under an index path.
///
/// The path is split on [`FAN_OUT`]. The first part is resolved normally;
/// an array result is spread into its elements, anything else is wrapped
/// into a one-element sequence. Each remaining part is then resolved
/// against every element so far, flattening array results one level. Every
/// leaf (including missing ones) is coerced into a [`Key`].
pub fn resolve_keys(record: &Value, path: &str) -> Vec<Key> {
    if record.is_null() {
        return Vec::new();
    }

    let mut parts = path.split(FAN_OUT);
    let first = parts.next().unwrap_or(path);

    // `None` marks a missing value, which is itself a valid (absent) key.
    let mut current: Vec<Option<&Value>> = match get_path(record, first) {
        Some(Value::Array(items)) => items.iter().map(Some).collect(),
        leaf => vec![leaf],
    };

    for part in parts {
        let mut next = Vec::new();
        for element in current {
            match element.and_then(|value| get_path(value, part)) {
                Some(Value::Array(items)) => next.extend(items.iter().map(Some)),
                leaf => next.push(leaf),
            }
        }
        current = next;
    }

    current.into_iter().map(Key::from_leaf).collect()
}
