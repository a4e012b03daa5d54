//! Tagged key queries
//!
//! Lookups never inspect raw JSON shapes ad hoc; every key argument is
//! resolved into an explicit [`KeyQuery`] variant before it reaches an
//! index: a single literal, a flattened multi-value lookup, or a negated
//! set ("every present key except these").

use serde_json::Value;

/// A conjunctive condition map: field path -> key query value.
///
/// `null` values do not constrain the conjunction; iteration order of the
/// map defines both the evaluation order and the intersection base order.
pub type Conditions = serde_json::Map<String, Value>;

/// A key argument for index lookup, resolved before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyQuery {
    /// Look up one key value.
    Literal(Value),
    /// Look up each value and flatten the results in operand order.
    Many(Vec<Value>),
    /// Look up every key currently present in the index except these.
    Not(Vec<Value>),
}

impl KeyQuery {
    /// Resolves the JSON forms a condition value may take: an object
    /// carrying `not_key` becomes [`KeyQuery::Not`] (its operand wrapped
    /// into a set when it is not already an array), an array becomes
    /// [`KeyQuery::Many`], anything else is a literal.
    pub fn parse(value: &Value, not_key: &str) -> KeyQuery {
        if let Value::Object(map) = value {
            if let Some(operand) = map.get(not_key) {
                let set = match operand {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                return KeyQuery::Not(set);
            }
        }
        match value {
            Value::Array(items) => KeyQuery::Many(items.clone()),
            other => KeyQuery::Literal(other.clone()),
        }
    }

    /// Shorthand for a single-key lookup.
    pub fn literal(value: impl Into<Value>) -> KeyQuery {
        KeyQuery::Literal(value.into())
    }
}

impl From<Value> for KeyQuery {
    fn from(value: Value) -> Self {
        KeyQuery::Literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scalar_is_literal() {
        assert_eq!(KeyQuery::parse(&json!(3), "$not"), KeyQuery::Literal(json!(3)));
        assert_eq!(
            KeyQuery::parse(&json!("a"), "$not"),
            KeyQuery::Literal(json!("a"))
        );
    }

    #[test]
    fn test_parse_array_is_many() {
        assert_eq!(
            KeyQuery::parse(&json!([1, 2]), "$not"),
            KeyQuery::Many(vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn test_parse_not_scalar_wraps_operand() {
        assert_eq!(
            KeyQuery::parse(&json!({"$not": 3}), "$not"),
            KeyQuery::Not(vec![json!(3)])
        );
    }

    #[test]
    fn test_parse_not_array() {
        assert_eq!(
            KeyQuery::parse(&json!({"$not": [1, 2]}), "$not"),
            KeyQuery::Not(vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn test_parse_respects_configured_not_key() {
        assert_eq!(
            KeyQuery::parse(&json!({"$except": 1}), "$except"),
            KeyQuery::Not(vec![json!(1)])
        );
        // The default operator name is just a key like any other here.
        assert_eq!(
            KeyQuery::parse(&json!({"$not": 1}), "$except"),
            KeyQuery::Literal(json!({"$not": 1}))
        );
    }
}
