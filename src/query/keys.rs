//! Key enumeration.

use super::pattern::{matching, Pattern, Segment};
use super::{inner_object, prune, set_value, KeysOptions, KeysReturnType};
use crate::tree::{Entry, Node, Version, VersionValue, VersionedTree, VALUE_KEY};
use crate::types::BlockHeight;
use serde_json::{Map, Value};

/// Keys matching `patterns` as of `height`, each with a marker chosen by
/// `options.return_type`.
pub fn keys(
    tree: &VersionedTree,
    patterns: &[Pattern],
    height: Option<BlockHeight>,
    options: &KeysOptions,
) -> Value {
    let walker = Walker { height, options };
    let mut out = Map::new();
    for pattern in patterns {
        walker.walk(&mut out, tree.root(), pattern.segments());
    }
    if !prune(&mut out) {
        out.clear();
    }
    Value::Object(out)
}

struct Walker<'a> {
    height: Option<BlockHeight>,
    options: &'a KeysOptions,
}

impl Walker<'_> {
    fn walk(&self, out: &mut Map<String, Value>, node: &Node, segments: &[Segment]) {
        let Some((segment, rest)) = segments.split_first() else {
            return;
        };
        let recursive = matches!(segment, Segment::Recursive);

        for (name, entry) in matching(node, segment) {
            let Some(version) = entry.version_at(self.height) else {
                continue;
            };
            let child = entry.node_at(self.height);

            if !rest.is_empty() {
                if let Some(child) = child {
                    self.walk(inner_object(out, name), child, rest);
                }
                continue;
            }

            if let Some(marker) = self.marker(entry, version, child) {
                set_value(out, name, marker);
            }
            if let (true, Some(child)) = (recursive, child) {
                self.walk(inner_object(out, name), child, segments);
            }
        }
    }

    /// Marker for a final-segment match, if the entry qualifies.
    fn marker(&self, entry: &Entry, version: &Version, child: Option<&Node>) -> Option<Value> {
        match (child, &version.value) {
            (Some(child), _) if self.options.values_only => {
                let value_entry = child.get(VALUE_KEY)?;
                let value_version = value_entry.version_at(self.height)?;
                match &value_version.value {
                    VersionValue::Leaf(text) if self.visible(text) => {
                        Some(self.describe(value_entry, value_version))
                    }
                    _ => None,
                }
            }
            (Some(_), _) => Some(self.describe(entry, version)),
            (None, VersionValue::Leaf(text)) if self.visible(text) => {
                Some(self.describe(entry, version))
            }
            (None, _) => None,
        }
    }

    fn visible(&self, text: &Option<String>) -> bool {
        text.is_some() || self.options.return_deleted
    }

    fn describe(&self, entry: &Entry, version: &Version) -> Value {
        match self.options.return_type {
            KeysReturnType::True => Value::Bool(true),
            KeysReturnType::BlockHeight => Value::from(version.height.0),
            KeysReturnType::History => Value::Array(
                entry
                    .history(self.height)
                    .into_iter()
                    .map(|h| Value::from(h.0))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::changes_from_json;
    use serde_json::json;

    fn tree(batches: &[(u64, Value)]) -> VersionedTree {
        let mut tree = VersionedTree::new();
        for (height, value) in batches {
            tree.write(&changes_from_json(value).unwrap(), BlockHeight(*height))
                .unwrap();
        }
        tree
    }

    fn query(tree: &VersionedTree, keys_: &[&str], height: Option<u64>, options: &KeysOptions) -> Value {
        let patterns: Vec<Pattern> = keys_
            .iter()
            .filter_map(|k| Pattern::parse(k).unwrap())
            .collect();
        keys(tree, &patterns, height.map(BlockHeight), options)
    }

    fn sample() -> VersionedTree {
        tree(&[
            (
                3,
                json!({
                    "alice": {"widget": {"app": "code", "lib": {"x": "1"}}},
                    "bob": {"widget": {"app": "code"}},
                }),
            ),
            (7, json!({"alice": {"widget": {"app": "code2", "old": null}}})),
        ])
    }

    #[test]
    fn test_keys_true_markers() {
        let tree = sample();
        assert_eq!(
            query(&tree, &["*/widget/*"], None, &KeysOptions::default()),
            json!({
                "alice": {"widget": {"app": true, "lib": true}},
                "bob": {"widget": {"app": true}},
            })
        );
    }

    #[test]
    fn test_keys_return_deleted() {
        let tree = sample();
        let options = KeysOptions {
            return_deleted: true,
            ..KeysOptions::default()
        };
        assert_eq!(
            query(&tree, &["alice/widget/*"], None, &options),
            json!({"alice": {"widget": {"app": true, "lib": true, "old": true}}})
        );
    }

    #[test]
    fn test_keys_block_height_and_history() {
        let tree = sample();
        let options = KeysOptions {
            return_type: KeysReturnType::BlockHeight,
            ..KeysOptions::default()
        };
        assert_eq!(
            query(&tree, &["alice/widget/app"], None, &options),
            json!({"alice": {"widget": {"app": 7}}})
        );

        let options = KeysOptions {
            return_type: KeysReturnType::History,
            ..KeysOptions::default()
        };
        assert_eq!(
            query(&tree, &["alice/widget/app"], None, &options),
            json!({"alice": {"widget": {"app": [3, 7]}}})
        );
        assert_eq!(
            query(&tree, &["alice/widget/app"], Some(5), &options),
            json!({"alice": {"widget": {"app": [3]}}})
        );
    }

    #[test]
    fn test_values_only_skips_pure_subtrees() {
        let tree = tree(&[
            (1, json!({"alice": {"a": "x", "b": {"c": "y"}}})),
            (2, json!({"alice": {"a": {"d": "z"}}})),
        ]);
        let options = KeysOptions {
            values_only: true,
            return_type: KeysReturnType::BlockHeight,
            ..KeysOptions::default()
        };
        // `a` became a subtree at 2 but its value still sits in `""` from 1.
        assert_eq!(
            query(&tree, &["alice/*"], None, &options),
            json!({"alice": {"a": 1}})
        );
    }

    #[test]
    fn test_recursive_keys() {
        let tree = sample();
        assert_eq!(
            query(&tree, &["alice/**"], None, &KeysOptions::default()),
            json!({"alice": {"widget": {"": true, "app": true, "lib": {"": true, "x": true}}}})
        );
    }
}
