//! Block-height versioned tree.
//!
//! The tree is an append-only mapping of path segments to entries. Every entry
//! keeps its full version history, so any read can be answered "as of" an
//! earlier block height. Batches are applied at strictly increasing heights.

mod change;
mod entry;

pub use change::{changes_from_json, merge_changes, Change, Changes};
pub use entry::{Entry, Node, Resolved, Version, VersionValue};

use crate::error::{Result, StoreError};
use crate::types::BlockHeight;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Child name under which a subtree keeps its own scalar value.
pub const VALUE_KEY: &str = "";

/// The versioned key space. Top-level children are accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedTree {
    root: Node,
    head: Option<BlockHeight>,
}

impl VersionedTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Height of the last applied batch.
    pub fn head(&self) -> Option<BlockHeight> {
        self.head
    }

    /// Apply a batch at `height`.
    ///
    /// The height must be above the current head. The batch is rejected
    /// without touching the tree otherwise.
    pub fn write(&mut self, changes: &Changes, height: BlockHeight) -> Result<()> {
        if let Some(head) = self.head {
            if height <= head {
                return Err(StoreError::InvalidHeight { height, head });
            }
        }
        self.root.write(changes, height);
        self.head = Some(height);
        Ok(())
    }

    /// Typed effective value at `path`.
    pub fn resolve(&self, path: &[&str], height: Option<BlockHeight>) -> Option<Resolved<'_>> {
        self.root.resolve(path, height)
    }

    /// JSON view of `path` at `height`: a string, a null tombstone, or the
    /// projected subtree. `None` if nothing was written there yet.
    pub fn read_at(&self, path: &[&str], height: Option<BlockHeight>) -> Option<Value> {
        match self.resolve(path, height)? {
            Resolved::Leaf(Some(text)) => Some(Value::String(text.to_string())),
            Resolved::Leaf(None) => Some(Value::Null),
            Resolved::Subtree(node) => Some(Value::Object(node.project(height))),
        }
    }

    /// Leaf text at `path`. A subtree at `path` reads as not found.
    pub fn read_leaf_at(&self, path: &[&str], height: Option<BlockHeight>) -> Option<Option<&str>> {
        match self.resolve(path, height)? {
            Resolved::Leaf(text) => Some(text),
            Resolved::Subtree(_) => None,
        }
    }

    /// The account's node as of `height`.
    pub fn account(&self, account_id: &str, height: Option<BlockHeight>) -> Option<&Node> {
        self.root.get(account_id)?.node_at(height)
    }

    pub fn account_count(&self) -> usize {
        self.root.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(tree: &mut VersionedTree, value: Value, height: u64) -> Result<()> {
        let changes = changes_from_json(&value)?;
        tree.write(&changes, BlockHeight(height))
    }

    #[test]
    fn test_write_requires_increasing_height() {
        let mut tree = VersionedTree::new();
        apply(&mut tree, json!({"a": "1"}), 10).unwrap();

        let before = tree.clone();
        let err = apply(&mut tree, json!({"a": "2"}), 10).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidHeight {
                height: BlockHeight(10),
                head: BlockHeight(10)
            }
        ));
        assert_eq!(tree, before);
        assert_eq!(tree.head(), Some(BlockHeight(10)));
    }

    #[test]
    fn test_read_at() {
        let mut tree = VersionedTree::new();
        apply(&mut tree, json!({"alice": {"profile": {"name": "Alice"}}}), 10).unwrap();
        apply(&mut tree, json!({"alice": {"profile": {"name": null}}}), 20).unwrap();

        assert_eq!(
            tree.read_at(&["alice", "profile", "name"], Some(BlockHeight(10))),
            Some(json!("Alice"))
        );
        assert_eq!(tree.read_at(&["alice", "profile", "name"], None), Some(Value::Null));
        assert_eq!(tree.read_at(&["alice", "profile", "name"], Some(BlockHeight(9))), None);
        assert_eq!(
            tree.read_at(&["alice", "profile"], Some(BlockHeight(15))),
            Some(json!({"name": "Alice"}))
        );
    }

    #[test]
    fn test_read_leaf_at_rejects_subtree() {
        let mut tree = VersionedTree::new();
        apply(&mut tree, json!({"alice": {"widget": {"app": {"": "code"}}}}), 3).unwrap();

        assert_eq!(tree.read_leaf_at(&["alice", "widget", "app"], None), None);
        assert_eq!(
            tree.read_leaf_at(&["alice", "widget", "app", ""], None),
            Some(Some("code"))
        );
    }

    #[test]
    fn test_type_transition_preserves_history() {
        let mut tree = VersionedTree::new();
        apply(&mut tree, json!({"a": "x"}), 10).unwrap();
        apply(&mut tree, json!({"a": {"b": "y"}}), 20).unwrap();

        assert_eq!(tree.read_at(&["a"], Some(BlockHeight(10))), Some(json!("x")));
        assert_eq!(tree.read_at(&["a", "b"], Some(BlockHeight(20))), Some(json!("y")));
        assert_eq!(
            tree.read_at(&["a"], Some(BlockHeight(20))),
            Some(json!({"": "x", "b": "y"}))
        );
    }
}
