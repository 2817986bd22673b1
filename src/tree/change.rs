//! Typed batch payloads and same-height merging.

use crate::error::StructuralError;
use crate::tree::VALUE_KEY;
use serde_json::{Map, Value};
use std::collections::btree_map::Entry as Slot;
use std::collections::BTreeMap;

/// Nested mapping of path segment to change, rooted at the tree root.
pub type Changes = BTreeMap<String, Change>;

/// A single write in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Set a leaf. `None` deletes (tombstone).
    Value(Option<String>),
    /// Merge into a subtree.
    Tree(Changes),
}

impl Change {
    /// Validate and convert a JSON payload.
    ///
    /// Only strings, nulls and objects are accepted anywhere in the payload.
    pub fn from_json(value: &Value) -> Result<Change, StructuralError> {
        match value {
            Value::Null => Ok(Change::Value(None)),
            Value::String(text) => Ok(Change::Value(Some(text.clone()))),
            Value::Object(map) => changes_from_map(map).map(Change::Tree),
            _ => Err(StructuralError::UnsupportedValue {
                path: String::new(),
            }),
        }
    }

    /// The subtree of this change, if it is one.
    pub fn as_tree(&self) -> Option<&Changes> {
        match self {
            Change::Tree(children) => Some(children),
            Change::Value(_) => None,
        }
    }

    /// The text this change assigns, either directly or through the `""` child.
    pub fn text(&self) -> Option<&str> {
        match self {
            Change::Value(text) => text.as_deref(),
            Change::Tree(children) => match children.get(VALUE_KEY) {
                Some(Change::Value(text)) => text.as_deref(),
                _ => None,
            },
        }
    }
}

/// Convert a root payload. The root itself must be an object.
pub fn changes_from_json(value: &Value) -> Result<Changes, StructuralError> {
    match value {
        Value::Object(map) => changes_from_map(map),
        _ => Err(StructuralError::UnsupportedValue {
            path: String::new(),
        }),
    }
}

fn changes_from_map(map: &Map<String, Value>) -> Result<Changes, StructuralError> {
    map.iter()
        .map(|(key, value)| {
            Change::from_json(value)
                .map(|change| (key.clone(), change))
                .map_err(|err| nest(err, key))
        })
        .collect()
}

fn nest(err: StructuralError, key: &str) -> StructuralError {
    match err {
        StructuralError::UnsupportedValue { path } if path.is_empty() => {
            StructuralError::UnsupportedValue {
                path: key.to_string(),
            }
        }
        StructuralError::UnsupportedValue { path } => StructuralError::UnsupportedValue {
            path: format!("{key}/{path}"),
        },
        other => other,
    }
}

/// Merge `incoming` into `base` so that both land in one batch.
///
/// Objects merge recursively, a scalar replaces a scalar, a scalar written over
/// an object goes to its `""` key, and an object written over a scalar keeps the
/// scalar under `""` unless the object sets `""` itself.
pub fn merge_changes(base: &mut Changes, incoming: Changes) {
    for (key, change) in incoming {
        match base.entry(key) {
            Slot::Vacant(slot) => {
                slot.insert(change);
            }
            Slot::Occupied(mut slot) => {
                let current = slot.get_mut();
                match change {
                    Change::Tree(children) => match current {
                        Change::Tree(existing) => merge_changes(existing, children),
                        Change::Value(prior) => {
                            let mut merged = Changes::new();
                            merged.insert(VALUE_KEY.to_string(), Change::Value(prior.take()));
                            merged.extend(children);
                            *current = Change::Tree(merged);
                        }
                    },
                    Change::Value(value) => match current {
                        Change::Tree(existing) => {
                            existing.insert(VALUE_KEY.to_string(), Change::Value(value));
                        }
                        Change::Value(prior) => *prior = value,
                    },
                }
            }
        }
    }
}
