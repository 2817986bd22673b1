//! Value queries.

use super::pattern::{matching, Pattern, Segment};
use super::{inner_object, prune, set_value, GetOptions, KEY_BLOCK_HEIGHT, KEY_TIMESTAMP};
use crate::tree::{Node, Version, VersionValue, VersionedTree, VALUE_KEY};
use crate::types::{BlockHeight, BlockTimes};
use serde_json::{Map, Value};

/// Values matching `patterns` as of `height` (latest if `None`), merged into
/// one pruned object.
pub fn get(
    tree: &VersionedTree,
    patterns: &[Pattern],
    height: Option<BlockHeight>,
    options: &GetOptions,
    block_times: &BlockTimes,
) -> Value {
    let walker = Walker {
        height,
        options,
        block_times,
        exact_height: false,
    };
    let mut out = Map::new();
    for pattern in patterns {
        walker.walk(&mut out, tree.root(), height, pattern.segments());
    }
    if !prune(&mut out) {
        out.clear();
    }
    Value::Object(out)
}

/// Changes written at exactly `height` under `node`, tombstones included,
/// descended by the pattern's literal prefix.
pub(crate) fn changes_at(node: &Node, pattern: &Pattern, height: BlockHeight) -> Option<Value> {
    let options = GetOptions {
        return_deleted: true,
        ..GetOptions::default()
    };
    let block_times = BlockTimes::new();
    let walker = Walker {
        height: Some(height),
        options: &options,
        block_times: &block_times,
        exact_height: true,
    };
    let mut out = Map::new();
    walker.walk(&mut out, node, Some(height), pattern.segments());

    let mut value = Value::Object(out);
    for name in pattern.literal_prefix() {
        value = match value {
            Value::Object(mut map) => map.remove(name)?,
            _ => return None,
        };
    }
    Some(value)
}

struct Walker<'a> {
    height: Option<BlockHeight>,
    options: &'a GetOptions,
    block_times: &'a BlockTimes,
    exact_height: bool,
}

impl Walker<'_> {
    fn walk(
        &self,
        out: &mut Map<String, Value>,
        node: &Node,
        node_height: Option<BlockHeight>,
        segments: &[Segment],
    ) {
        let Some((segment, rest)) = segments.split_first() else {
            return;
        };
        let recursive = matches!(segment, Segment::Recursive);
        self.annotate(out, node_height);

        for (name, entry) in matching(node, segment) {
            let Some(version) = entry.version_at(self.height) else {
                continue;
            };
            if self.exact_height && Some(version.height) != self.height {
                continue;
            }
            match (&version.value, entry.node()) {
                (VersionValue::Subtree, Some(child)) => {
                    if !rest.is_empty() || recursive {
                        let inner = inner_object(out, name);
                        if !rest.is_empty() {
                            self.walk(inner, child, Some(version.height), rest);
                        }
                        if recursive {
                            self.walk(inner, child, Some(version.height), segments);
                        }
                    } else if let Some(Version {
                        height,
                        value: VersionValue::Leaf(text),
                    }) = child.get(VALUE_KEY).and_then(|e| e.version_at(self.height))
                    {
                        self.set_leaf(out, name, text.as_deref(), *height);
                    }
                }
                (VersionValue::Leaf(text), _) if rest.is_empty() => {
                    self.set_leaf(out, name, text.as_deref(), version.height);
                }
                _ => {}
            }
        }
    }

    fn set_leaf(&self, out: &mut Map<String, Value>, name: &str, text: Option<&str>, height: BlockHeight) {
        let value = text.map_or(Value::Null, |t| Value::String(t.to_string()));
        let visible = text.is_some() || self.options.return_deleted;

        if self.options.with_metadata() {
            let mut wrapped = Map::new();
            if visible {
                wrapped.insert(String::new(), value);
            }
            self.annotate(&mut wrapped, Some(height));
            set_value(out, name, Value::Object(wrapped));
        } else if visible {
            set_value(out, name, value);
        }
    }

    fn annotate(&self, out: &mut Map<String, Value>, height: Option<BlockHeight>) {
        let Some(height) = height else { return };
        if self.options.with_block_height {
            out.insert(KEY_BLOCK_HEIGHT.to_string(), Value::from(height.0));
        }
        if self.options.with_timestamp {
            if let Some(timestamp) = self.block_times.get(height) {
                out.insert(KEY_TIMESTAMP.to_string(), Value::from(timestamp.0));
            }
        }
    }
}
