//! Poll loop feeding change records into the store.

use super::feed::{ChangeFeed, ChangeRecord};
use crate::error::Result;
use crate::store::Store;
use crate::tree::{changes_from_json, merge_changes, Changes};
use crate::types::{BlockHeight, FeedCursor, Timestamp};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Ingestion configuration.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Records requested per fetch.
    pub page_size: usize,

    /// Pause between successful polls.
    pub poll_interval: Duration,

    /// Pause after a feed error.
    pub retry_delay: Duration,

    /// Minimum time between snapshot writes.
    pub snapshot_interval: Duration,

    /// How long the newest height is held back while more of its records may
    /// still arrive. A larger height always completes it.
    pub settle_time: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            poll_interval: Duration::from_millis(250),
            retry_delay: Duration::from_secs(1),
            snapshot_interval: Duration::from_secs(60),
            settle_time: Duration::from_secs(1),
        }
    }
}

/// Result of one poll cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub records: usize,
    pub batches: usize,
    pub rejected: usize,
    pub skipped_records: usize,

    /// Records of the newest height, left for a later poll.
    pub held_records: usize,
}

/// Records of one block height, merged into a single batch.
struct PendingBatch {
    records: usize,
    height: BlockHeight,
    changes: Changes,
    timestamp: Timestamp,
    cursor: FeedCursor,
    skipped: usize,
    invalid: Option<String>,
}

impl PendingBatch {
    fn new(record: &ChangeRecord) -> Self {
        Self {
            records: 0,
            height: record.block_height,
            changes: Changes::new(),
            timestamp: Timestamp::from_nanos(record.block_timestamp_ns),
            cursor: record.cursor(),
            skipped: 0,
            invalid: None,
        }
    }

    fn add(&mut self, record: ChangeRecord) {
        self.records += 1;
        self.cursor = record.cursor();
        self.timestamp = Timestamp::from_nanos(record.block_timestamp_ns);
        if !record.changes.is_object() {
            warn!(
                account = %record.account_id,
                height = record.block_height.0,
                index = record.sequence_index,
                "Skipping record without object changes"
            );
            self.skipped += 1;
            return;
        }
        match changes_from_json(&record.changes) {
            Ok(changes) => merge_changes(&mut self.changes, changes),
            Err(e) => {
                self.invalid.get_or_insert_with(|| e.to_string());
            }
        }
    }
}

/// Pulls records from a feed and applies them to the store batch by batch.
pub struct Ingestor<F> {
    store: Arc<Store>,
    feed: F,
    config: IngestConfig,
    last_snapshot: Instant,

    /// Newest height seen but not applied, and when it was first seen.
    trailing: Option<(BlockHeight, Instant)>,
}

impl<F: ChangeFeed> Ingestor<F> {
    pub fn new(store: Arc<Store>, feed: F, config: IngestConfig) -> Self {
        Self {
            store,
            feed,
            config,
            last_snapshot: Instant::now(),
            trailing: None,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Fetch everything after the store's cursor and apply it.
    ///
    /// Pages are fetched until an empty one comes back. A feed error aborts the
    /// cycle before anything is applied. The newest height is only applied once
    /// a larger height shows up or it has waited for `settle_time`. Until then
    /// the cursor stays before it and its records are fetched again.
    pub fn poll_once(&mut self) -> Result<PollSummary> {
        let mut cursor = self.store.cursor().unwrap_or_default();
        let mut records = Vec::new();
        loop {
            let page = self.feed.fetch_after(cursor, self.config.page_size)?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.cursor();
            records.extend(page);
        }

        let mut summary = PollSummary {
            records: records.len(),
            ..PollSummary::default()
        };
        let mut batches: Vec<PendingBatch> = Vec::new();
        for record in records {
            match batches.last_mut() {
                Some(batch) if batch.height == record.block_height => batch.add(record),
                _ => {
                    let mut batch = PendingBatch::new(&record);
                    batch.add(record);
                    batches.push(batch);
                }
            }
        }

        if let Some(newest) = batches.last() {
            if !self.settled(newest.height) {
                summary.held_records = newest.records;
                batches.pop();
            }
        }
        for batch in batches {
            if self.trailing.is_some_and(|(height, _)| height <= batch.height) {
                self.trailing = None;
            }
            self.apply(batch, &mut summary);
        }

        if summary.records > 0 {
            info!(
                records = summary.records,
                batches = summary.batches,
                rejected = summary.rejected,
                skipped = summary.skipped_records,
                held = summary.held_records,
                head = ?self.store.head(),
                "Ingested records"
            );
        }
        Ok(summary)
    }

    /// Whether the newest fetched height may be applied now.
    fn settled(&mut self, height: BlockHeight) -> bool {
        match self.trailing {
            Some((held, since)) if held == height => since.elapsed() >= self.config.settle_time,
            _ => {
                self.trailing = Some((height, Instant::now()));
                self.config.settle_time.is_zero()
            }
        }
    }

    fn apply(&self, batch: PendingBatch, summary: &mut PollSummary) {
        summary.skipped_records += batch.skipped;
        if let Some(reason) = batch.invalid {
            error!(height = batch.height.0, %reason, "Rejected batch");
            summary.rejected += 1;
        } else if !batch.changes.is_empty() {
            match self
                .store
                .apply_batch(batch.height, &batch.changes, Some(batch.timestamp))
            {
                Ok(_) => summary.batches += 1,
                Err(e) => {
                    error!(height = batch.height.0, error = %e, "Rejected batch");
                    summary.rejected += 1;
                }
            }
        }
        self.store.advance_cursor(batch.cursor);
    }

    /// Poll until `shutdown` receives a message or disconnects.
    pub fn run(mut self, shutdown: Receiver<()>) {
        info!(page_size = self.config.page_size, "Ingestion started");
        loop {
            let delay = match self.poll_once() {
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    warn!(error = %e, "Feed error, retrying");
                    self.config.retry_delay
                }
            };
            self.maybe_snapshot();

            match shutdown.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.snapshot();
        info!(head = ?self.store.head(), "Ingestion stopped");
    }

    fn maybe_snapshot(&mut self) {
        if self.last_snapshot.elapsed() >= self.config.snapshot_interval {
            self.snapshot();
        }
    }

    fn snapshot(&mut self) {
        self.last_snapshot = Instant::now();
        if let Err(e) = self.store.save_snapshot() {
            warn!(error = %e, "Snapshot failed");
        }
    }
}

impl<F: ChangeFeed + Send + 'static> Ingestor<F> {
    /// Run the poll loop on its own thread.
    pub fn spawn(self) -> IngestHandle {
        let (shutdown, receiver) = bounded(1);
        let thread = thread::spawn(move || self.run(receiver));
        IngestHandle {
            shutdown,
            thread: Some(thread),
        }
    }
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct IngestHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl IngestHandle {
    /// Signal shutdown and wait for the loop to finish.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Ingestion thread panicked");
            }
        }
    }
}

impl Drop for IngestHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
