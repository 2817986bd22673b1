//! Entries, versions and nodes of the versioned tree.

use crate::tree::change::{Change, Changes};
use crate::tree::VALUE_KEY;
use crate::types::BlockHeight;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Value recorded by one version of an entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionValue {
    /// Text value. `None` is a tombstone.
    Leaf(Option<String>),
    /// The entry's node is the effective value.
    Subtree,
}

/// One height-stamped value of an entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub height: BlockHeight,
    pub value: VersionValue,
}

/// Effective value of an entry at some height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    Leaf(Option<&'a str>),
    Subtree(&'a Node),
}

/// A named slot with its own version history.
///
/// An entry owns at most one node. Once it has become a subtree it stays one:
/// later leaf writes go to the node's `""` child, and every write pushes a
/// `Subtree` version so the entry records each height it was touched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    versions: Vec<Version>,
    node: Option<Node>,
}

impl Entry {
    /// All versions, ordered by strictly increasing height.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// The owned node, if the entry ever became a subtree.
    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// The version with the greatest height <= `height` (latest if `None`).
    pub fn version_at(&self, height: Option<BlockHeight>) -> Option<&Version> {
        match height {
            None => self.versions.last(),
            Some(height) => {
                let count = self.versions.partition_point(|v| v.height <= height);
                count.checked_sub(1).map(|i| &self.versions[i])
            }
        }
    }

    /// The typed effective value at `height`.
    pub fn resolve_at(&self, height: Option<BlockHeight>) -> Option<Resolved<'_>> {
        let version = self.version_at(height)?;
        match &version.value {
            VersionValue::Leaf(text) => Some(Resolved::Leaf(text.as_deref())),
            VersionValue::Subtree => self.node.as_ref().map(Resolved::Subtree),
        }
    }

    /// The node if the effective value at `height` is a subtree.
    pub fn node_at(&self, height: Option<BlockHeight>) -> Option<&Node> {
        match self.resolve_at(height)? {
            Resolved::Subtree(node) => Some(node),
            Resolved::Leaf(_) => None,
        }
    }

    /// Heights of all versions up to and including `height`.
    pub fn history(&self, height: Option<BlockHeight>) -> Vec<BlockHeight> {
        let count = match height {
            None => self.versions.len(),
            Some(height) => self.versions.partition_point(|v| v.height <= height),
        };
        self.versions[..count].iter().map(|v| v.height).collect()
    }

    /// Every leaf value this entry ever held, in height order.
    ///
    /// Includes values written through the `""` child after the entry became a
    /// subtree. The leaf relocated into `""` by that transition is reported once.
    pub fn leaf_history(&self) -> Vec<(BlockHeight, Option<&str>)> {
        let mut history: Vec<_> = self
            .versions
            .iter()
            .filter_map(|v| match &v.value {
                VersionValue::Leaf(text) => Some((v.height, text.as_deref())),
                VersionValue::Subtree => None,
            })
            .collect();

        if let Some(child) = self.node.as_ref().and_then(|node| node.get(VALUE_KEY)) {
            let relocated = usize::from(!history.is_empty());
            history.extend(child.leaf_history().into_iter().skip(relocated));
        }
        history
    }

    pub(crate) fn write(&mut self, change: &Change, height: BlockHeight) {
        if self.node.is_none() {
            match change {
                Change::Value(text) => {
                    self.push(height, VersionValue::Leaf(text.clone()));
                    return;
                }
                Change::Tree(_) => self.node = Some(self.relocated_node()),
            }
        }

        if let Some(node) = self.node.as_mut() {
            match change {
                Change::Tree(children) => node.write(children, height),
                Change::Value(_) => node.child_mut(VALUE_KEY).write(change, height),
            }
        }
        self.push(height, VersionValue::Subtree);
    }

    /// New node for a leaf-to-subtree transition, carrying the prior leaf.
    ///
    /// The leaf keeps its original height, not the height of the write that
    /// moved it, so reads between the two heights still find it.
    fn relocated_node(&self) -> Node {
        let mut node = Node::default();
        if let Some(prior) = self.versions.last() {
            node.children.insert(
                VALUE_KEY.to_string(),
                Entry {
                    versions: vec![prior.clone()],
                    node: None,
                },
            );
        }
        node
    }

    fn push(&mut self, height: BlockHeight, value: VersionValue) {
        debug_assert!(
            self.versions.last().map_or(true, |last| last.height < height),
            "version heights must be strictly increasing"
        );
        self.versions.push(Version { height, value });
    }
}

/// A mapping of child names to entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    children: BTreeMap<String, Entry>,
}

impl Node {
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.children.get(name)
    }

    /// Children in canonical (sorted) key order.
    pub fn children(&self) -> btree_map::Iter<'_, String, Entry> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve a literal path. An empty path resolves to this node.
    pub fn resolve(&self, path: &[&str], height: Option<BlockHeight>) -> Option<Resolved<'_>> {
        let Some((last, parents)) = path.split_last() else {
            return Some(Resolved::Subtree(self));
        };
        let mut node = self;
        for segment in parents {
            node = node.get(segment)?.node_at(height)?;
        }
        node.get(last)?.resolve_at(height)
    }

    /// Plain JSON view of this node at `height`, without tombstones or empty subtrees.
    pub fn project(&self, height: Option<BlockHeight>) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, entry) in &self.children {
            match entry.resolve_at(height) {
                Some(Resolved::Leaf(Some(text))) => {
                    out.insert(name.clone(), Value::String(text.to_string()));
                }
                Some(Resolved::Subtree(node)) => {
                    let inner = node.project(height);
                    if !inner.is_empty() {
                        out.insert(name.clone(), Value::Object(inner));
                    }
                }
                Some(Resolved::Leaf(None)) | None => {}
            }
        }
        out
    }

    pub(crate) fn write(&mut self, changes: &Changes, height: BlockHeight) {
        for (name, change) in changes {
            self.child_mut(name).write(change, height);
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut Entry {
        self.children.entry(name.to_string()).or_default()
    }
}
