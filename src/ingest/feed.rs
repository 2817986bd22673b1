//! Change record source.

use crate::error::{Result, StoreError};
use crate::types::{AccountId, BlockHeight, FeedCursor};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One committed write, as delivered by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Signer of the write.
    pub account_id: AccountId,
    pub block_height: BlockHeight,

    /// Position of the record within its block.
    pub sequence_index: u64,

    /// Block timestamp in nanoseconds.
    pub block_timestamp_ns: u64,

    /// Changes rooted at the tree root, keyed by account id.
    pub changes: Value,
}

impl ChangeRecord {
    pub fn cursor(&self) -> FeedCursor {
        FeedCursor::new(self.block_height, self.sequence_index)
    }
}

/// Ordered source of change records.
///
/// Records come in non-decreasing `(block_height, sequence_index)` order.
pub trait ChangeFeed {
    /// Up to `limit` records strictly after `cursor`.
    fn fetch_after(&mut self, cursor: FeedCursor, limit: usize) -> Result<Vec<ChangeRecord>>;
}

#[derive(Debug, Default)]
struct MemoryFeedInner {
    records: Vec<ChangeRecord>,
    failures: usize,
}

/// In-process feed. Clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryFeed {
    inner: Arc<Mutex<MemoryFeedInner>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, keeping feed order.
    pub fn push(&self, record: ChangeRecord) {
        let mut inner = self.inner.lock();
        let position = inner
            .records
            .partition_point(|r| r.cursor() <= record.cursor());
        inner.records.insert(position, record);
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures = count;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeFeed for MemoryFeed {
    fn fetch_after(&mut self, cursor: FeedCursor, limit: usize) -> Result<Vec<ChangeRecord>> {
        let mut inner = self.inner.lock();
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(StoreError::Feed("injected failure".into()));
        }
        let start = inner
            .records
            .partition_point(|r| !cursor.precedes(r.block_height, r.sequence_index));
        Ok(inner.records[start..].iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(height: u64, index: u64) -> ChangeRecord {
        ChangeRecord {
            account_id: "alice".into(),
            block_height: BlockHeight(height),
            sequence_index: index,
            block_timestamp_ns: height * 1_000_000,
            changes: json!({"alice": {"n": index.to_string()}}),
        }
    }

    #[test]
    fn test_fetch_after_cursor() {
        let mut feed = MemoryFeed::new();
        feed.push(record(2, 0));
        feed.push(record(1, 1));
        feed.push(record(1, 0));
        feed.push(record(2, 1));

        let page = feed.fetch_after(FeedCursor::default(), 3).unwrap();
        let cursors: Vec<_> = page.iter().map(ChangeRecord::cursor).collect();
        assert_eq!(
            cursors,
            vec![
                FeedCursor::new(BlockHeight(1), 0),
                FeedCursor::new(BlockHeight(1), 1),
                FeedCursor::new(BlockHeight(2), 0),
            ]
        );

        let rest = feed.fetch_after(cursors[2], 10).unwrap();
        assert_eq!(rest, vec![record(2, 1)]);
        assert!(feed.fetch_after(rest[0].cursor(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let mut feed = MemoryFeed::new();
        feed.push(record(1, 0));
        feed.fail_next(1);
        assert!(matches!(
            feed.fetch_after(FeedCursor::default(), 10),
            Err(StoreError::Feed(_))
        ));
        assert_eq!(feed.fetch_after(FeedCursor::default(), 10).unwrap().len(), 1);
    }
}
