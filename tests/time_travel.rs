//! Property tests for historical reads.

use proptest::prelude::*;
use serde_json::{Map, Value};
use social_chronicle::tree::Entry;
use social_chronicle::{changes_from_json, BlockHeight, VersionedTree};

const NAMES: &[&str] = &["a", "b", "c"];

/// One random write: a path of 1..=3 names and a value.
#[derive(Clone, Debug)]
enum Write {
    Text(Vec<&'static str>, String),
    Delete(Vec<&'static str>),
}

fn write_strategy() -> impl Strategy<Value = Write> {
    let path = prop::collection::vec(prop::sample::select(NAMES), 1..=3);
    prop_oneof![
        3 => (path.clone(), "[a-z]{1,3}").prop_map(|(p, v)| Write::Text(p, v)),
        1 => path.prop_map(Write::Delete),
    ]
}

fn batch_strategy() -> impl Strategy<Value = Vec<Vec<Write>>> {
    prop::collection::vec(prop::collection::vec(write_strategy(), 1..4), 1..8)
}

/// Build a batch object. Later writes in a batch overwrite earlier ones, and a
/// write that would nest under a written leaf is dropped.
fn batch_json(writes: &[Write]) -> Value {
    let mut root = Map::new();
    for write in writes {
        let (path, value) = match write {
            Write::Text(path, text) => (path, Value::String(text.clone())),
            Write::Delete(path) => (path, Value::Null),
        };
        let mut node = &mut root;
        let mut blocked = false;
        for name in &path[..path.len() - 1] {
            if !node.get(*name).map_or(true, Value::is_object) {
                blocked = true;
                break;
            }
            node = node
                .entry(name.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .unwrap();
        }
        if !blocked {
            node.insert(path[path.len() - 1].to_string(), value);
        }
    }
    Value::Object(root)
}

fn build(batches: &[Vec<Write>], upto: usize) -> VersionedTree {
    let mut tree = VersionedTree::new();
    for (i, writes) in batches.iter().take(upto).enumerate() {
        let changes = changes_from_json(&batch_json(writes)).unwrap();
        tree.write(&changes, BlockHeight(i as u64 + 1)).unwrap();
    }
    tree
}

fn all_paths() -> Vec<Vec<&'static str>> {
    let mut paths = Vec::new();
    for a in NAMES {
        paths.push(vec![*a]);
        for b in NAMES {
            paths.push(vec![*a, *b]);
            for c in NAMES {
                paths.push(vec![*a, *b, *c]);
            }
        }
    }
    paths
}

fn assert_monotonic<'a>(entries: impl Iterator<Item = (&'a String, &'a Entry)>) {
    for (name, entry) in entries {
        let heights: Vec<u64> = entry.versions().iter().map(|v| v.height.0).collect();
        assert!(
            heights.windows(2).all(|w| w[0] < w[1]),
            "{name}: {heights:?}"
        );
        if let Some(node) = entry.node() {
            assert_monotonic(node.children());
        }
    }
}

proptest! {
    #[test]
    fn prop_past_reads_are_stable(batches in batch_strategy(), cut in 0usize..8) {
        let cut = cut.min(batches.len());
        let partial = build(&batches, cut);
        let full = build(&batches, batches.len());
        let height = Some(BlockHeight(cut as u64));

        for path in all_paths() {
            prop_assert_eq!(
                partial.read_at(&path, height),
                full.read_at(&path, height),
                "path {:?} at {}", path, cut
            );
        }
    }

    #[test]
    fn prop_versions_are_monotonic(batches in batch_strategy()) {
        let tree = build(&batches, batches.len());
        assert_monotonic(tree.root().children());
    }
}
