//! Core types shared across the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Account identifiers are the top-level keys of the tree.
pub type AccountId = String;

/// Height of the block that committed a batch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct BlockHeight(pub u64);

impl fmt::Debug for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Height({})", self.0)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockHeight {
    fn from(height: u64) -> Self {
        BlockHeight(height)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Convert a nanosecond block timestamp, rounding to the nearest millisecond.
    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos.saturating_add(500_000) / 1_000_000)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Block height to block timestamp side table, filled by ingestion.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockTimes(BTreeMap<BlockHeight, Timestamp>);

impl BlockTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, height: BlockHeight, timestamp: Timestamp) {
        self.0.insert(height, timestamp);
    }

    pub fn get(&self, height: BlockHeight) -> Option<Timestamp> {
        self.0.get(&height).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// High-water mark of the change feed: the last applied `(height, sequence index)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct FeedCursor {
    pub block_height: BlockHeight,
    pub sequence_index: u64,
}

impl FeedCursor {
    pub fn new(block_height: BlockHeight, sequence_index: u64) -> Self {
        Self {
            block_height,
            sequence_index,
        }
    }

    /// Whether a record at `(height, index)` comes strictly after this cursor.
    pub fn precedes(&self, height: BlockHeight, index: u64) -> bool {
        (height, index) > (self.block_height, self.sequence_index)
    }
}

/// A request field that takes either one value or a list of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    /// Map every item, keeping the one-or-many shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> OneOrMany<U> {
        let mut f = f;
        match self {
            OneOrMany::One(item) => OneOrMany::One(f(item)),
            OneOrMany::Many(items) => OneOrMany::Many(items.iter().map(f).collect()),
        }
    }
}
