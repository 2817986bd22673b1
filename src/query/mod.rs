//! Pattern queries over the versioned tree.
//!
//! Both `get` and `keys` walk the tree along each pattern, resolve every
//! matched child at the requested height and merge the results of all
//! patterns into one JSON object. Branches without real values are pruned
//! before returning.

mod get;
mod keys;
mod options;
mod pattern;

pub use get::get;
pub(crate) use get::changes_at;
pub use keys::keys;
pub use options::{GetOptions, KeysOptions, KeysReturnType};
pub use pattern::{Pattern, Segment};

use serde_json::{Map, Value};

/// Prefix of metadata keys in query output.
pub const METADATA_PREFIX: char = ':';

/// Metadata key for the block height of a value.
pub const KEY_BLOCK_HEIGHT: &str = ":block";

/// Metadata key for the block timestamp of a value.
pub const KEY_TIMESTAMP: &str = ":timestamp";

/// The object stored under `name`, creating it if needed.
///
/// A scalar already stored there moves under the object's `""` key.
pub(crate) fn inner_object<'a>(out: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    let slot = out
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        let mut wrapped = Map::new();
        wrapped.insert(String::new(), slot.take());
        *slot = Value::Object(wrapped);
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot holds an object"),
    }
}

/// Store `value` under `name`, or under its `""` key if `name` is already an object.
pub(crate) fn set_value(out: &mut Map<String, Value>, name: &str, value: Value) {
    match out.get_mut(name) {
        Some(Value::Object(existing)) => {
            existing.insert(String::new(), value);
        }
        _ => {
            out.insert(name.to_string(), value);
        }
    }
}

/// Remove branches holding only metadata. Returns whether anything real is left.
pub(crate) fn prune(map: &mut Map<String, Value>) -> bool {
    let mut has_values = false;
    map.retain(|key, value| match value {
        Value::Object(inner) => {
            let keep = prune(inner);
            has_values |= keep;
            keep
        }
        _ => {
            has_values |= !key.starts_with(METADATA_PREFIX);
            true
        }
    });
    has_values
}
