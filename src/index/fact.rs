//! Index facts and their payload parsing.

use crate::types::{AccountId, BlockHeight};
use serde_json::{Map, Value};

/// Identity of one index log: canonical key JSON and action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    /// Canonical JSON of the payload's `key`.
    pub key: String,

    /// Action name under `<account>/index/`.
    pub action: String,
}

impl IndexKey {
    /// Build a lookup key from a raw `key` value.
    pub fn new(key: &Value, action: impl Into<String>) -> Self {
        Self {
            key: canonical_json(key),
            action: action.into(),
        }
    }
}

/// One fact extracted from an account's `index` subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexFact {
    pub index_key: IndexKey,

    /// The canonicalized `key`.
    pub key: Value,

    pub account_id: AccountId,
    pub value: Value,
    pub block_height: BlockHeight,
}

/// Recursively sort object keys. Array order is preserved.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON text of the canonicalized value.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Parse one index payload: a JSON object or an array of objects, each with
/// `key` and `value`. Anything malformed is dropped.
pub(crate) fn parse_facts(
    account_id: &str,
    action: &str,
    text: &str,
    block_height: BlockHeight,
) -> Vec<IndexFact> {
    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    let items = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };

    items
        .into_iter()
        .filter_map(|item| {
            let Value::Object(mut object) = item else {
                return None;
            };
            let key = canonicalize(&object.remove("key")?);
            let value = object.remove("value")?;
            Some(IndexFact {
                index_key: IndexKey {
                    key: key.to_string(),
                    action: action.to_string(),
                },
                key,
                account_id: account_id.to_string(),
                value,
                block_height,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"type": "social", "path": {"b": 1, "a": [{"y": 1, "x": 2}]}});
        let b = json!({"path": {"a": [{"x": 2, "y": 1}], "b": 1}, "type": "social"});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(
            canonical_json(&json!([2, 1])),
            "[2,1]",
            "array order is preserved"
        );
    }

    #[test]
    fn test_parse_single_and_array() {
        let facts = parse_facts("alice", "like", r#"{"key": "k", "value": 1}"#, BlockHeight(3));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].index_key, IndexKey::new(&json!("k"), "like"));
        assert_eq!(facts[0].value, json!(1));
        assert_eq!(facts[0].account_id, "alice");

        let facts = parse_facts(
            "alice",
            "notify",
            r#"[{"key": "bob", "value": {"type": "like"}}, {"key": "carol"}, 5, {"key": "dave", "value": null}]"#,
            BlockHeight(4),
        );
        let keys: Vec<_> = facts.iter().map(|f| f.key.clone()).collect();
        assert_eq!(keys, vec![json!("bob"), json!("dave")]);
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert!(parse_facts("alice", "like", "not json", BlockHeight(1)).is_empty());
        assert!(parse_facts("alice", "like", r#""just a string""#, BlockHeight(1)).is_empty());
    }
}
