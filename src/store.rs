//! Main Store struct tying all components together.

use crate::api::{
    AccountStatsRequest, ApiRequest, GetRequest, IndexRequest, KeysRequest, LikesRequest,
    TimeRequest,
};
use crate::cache::QueryCache;
use crate::error::{Result, StoreError};
use crate::events::{derive_all, derive_for_batch, DomainEvent};
use crate::index::{IndexEngine, IndexEntry};
use crate::query;
use crate::snapshot::{self, SnapshotRef};
use crate::stats::{AccountCounters, AccountGraph, GlobalCounters, StatsAggregator};
use crate::tree::{changes_from_json, Changes, VersionedTree};
use crate::types::{AccountId, BlockHeight, BlockTimes, FeedCursor, OneOrMany, Timestamp};
use parking_lot::RwLock;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Snapshot file. `None` keeps the store in memory only.
    pub snapshot_path: Option<PathBuf>,

    /// Cached responses per endpoint.
    pub cache_capacity: usize,

    /// Whether to start empty if the snapshot file doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            cache_capacity: 1000,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// In-memory store persisted to `path`.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            ..Self::default()
        }
    }
}

/// What one applied batch produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSummary {
    pub height: BlockHeight,
    pub facts: usize,
    pub events: usize,
}

/// Everything guarded by the store lock.
struct StoreState {
    tree: VersionedTree,
    index: IndexEngine,
    events: Vec<DomainEvent>,
    stats: StatsAggregator,
    block_times: BlockTimes,
    cursor: Option<FeedCursor>,
}

impl StoreState {
    /// Build the derived index, event log and stats for a loaded tree.
    fn rebuild(tree: VersionedTree, block_times: BlockTimes, cursor: Option<FeedCursor>) -> Self {
        let mut index = IndexEngine::new();
        let facts = index.build_all(&tree);
        let events = derive_all(&tree, &facts);
        let mut stats = StatsAggregator::new();
        stats.process_events(&events);

        info!(
            accounts = tree.account_count(),
            head = ?tree.head(),
            facts = index.len(),
            events = events.len(),
            block_times = block_times.len(),
            "Derived state rebuilt"
        );

        Self {
            tree,
            index,
            events,
            stats,
            block_times,
            cursor,
        }
    }

    fn get(&self, request: &GetRequest) -> Result<Value> {
        let patterns = request.patterns()?;
        Ok(query::get(
            &self.tree,
            &patterns,
            request.block_height,
            &request.options,
            &self.block_times,
        ))
    }

    fn keys(&self, request: &KeysRequest) -> Result<Value> {
        let patterns = request.patterns()?;
        Ok(query::keys(
            &self.tree,
            &patterns,
            request.block_height,
            &request.options,
        ))
    }

    fn index(&self, request: &IndexRequest) -> Result<Vec<IndexEntry>> {
        let (key, action, options) = request.validate()?;
        Ok(self.index.query(key, action, &options))
    }

    fn time(&self, request: &TimeRequest) -> Result<OneOrMany<Option<Timestamp>>> {
        let heights = request.validate()?;
        Ok(heights.map(|height| self.block_times.get(*height)))
    }

    fn account_stats(&self, request: &AccountStatsRequest) -> Result<OneOrMany<Option<&AccountCounters>>> {
        let accounts = request.validate()?;
        Ok(accounts.map(|id| self.stats.account_stats(id)))
    }

    fn likes(&self, request: &LikesRequest) -> Result<OneOrMany<Vec<AccountId>>> {
        let items = request.validate()?;
        Ok(items.map(|item| self.stats.likes(item)))
    }

    fn respond(&self, request: &ApiRequest) -> Result<String> {
        Ok(match request {
            ApiRequest::Get(r) => serde_json::to_string(&self.get(r)?)?,
            ApiRequest::Keys(r) => serde_json::to_string(&self.keys(r)?)?,
            ApiRequest::Index(r) => serde_json::to_string(&self.index(r)?)?,
            ApiRequest::Time(r) => serde_json::to_string(&self.time(r)?)?,
            ApiRequest::AccountStats(r) => serde_json::to_string(&self.account_stats(r)?)?,
            ApiRequest::Likes(r) => serde_json::to_string(&self.likes(r)?)?,
        })
    }
}

/// The versioned social store.
///
/// Owns the tree and everything derived from it:
/// - the secondary index over `<account>/index/<action>`
/// - the domain event log and the statistics folded from it
/// - block timestamps and the feed cursor
/// - the per-batch response cache
///
/// Batches are applied under the write lock, so readers see either the state
/// before a batch or after it, never in between.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    state: RwLock<StoreState>,

    /// Responses computed since the last applied batch.
    cache: QueryCache,
}

impl Store {
    /// Create an empty store without reading any snapshot.
    pub fn new(config: StoreConfig) -> Self {
        let cache = QueryCache::new(config.cache_capacity);
        Self {
            config,
            state: RwLock::new(StoreState::rebuild(
                VersionedTree::new(),
                BlockTimes::new(),
                None,
            )),
            cache,
        }
    }

    /// Open the store from its snapshot, or empty if there is none.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let snapshot = match &config.snapshot_path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading snapshot");
                snapshot::load(path)?
            }
            Some(path) if !config.create_if_missing => {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("snapshot {} not found", path.display()),
                )));
            }
            _ => snapshot::Snapshot::default(),
        };

        let cache = QueryCache::new(config.cache_capacity);
        Ok(Self {
            config,
            state: RwLock::new(StoreState::rebuild(
                snapshot.tree,
                snapshot.block_times,
                snapshot.cursor,
            )),
            cache,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Writes ---

    /// Apply one batch at `height`.
    ///
    /// The tree, index, event log and stats are updated under one write lock
    /// and the response cache is cleared before it is released. A batch at or
    /// below the head height is rejected without changing anything.
    pub fn apply_batch(
        &self,
        height: BlockHeight,
        changes: &Changes,
        timestamp: Option<Timestamp>,
    ) -> Result<BatchSummary> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        state.tree.write(changes, height)?;
        if let Some(timestamp) = timestamp {
            state.block_times.insert(height, timestamp);
        }

        let facts = state.index.append_for_batch(changes, height);
        let events = derive_for_batch(&state.tree, changes, height, &facts);
        let summary = BatchSummary {
            height,
            facts: facts.len(),
            events: events.len(),
        };
        state.events.extend(events);
        state.stats.process_events(&state.events);
        self.cache.clear();

        debug!(
            height = height.0,
            accounts = changes.len(),
            facts = summary.facts,
            events = summary.events,
            "Applied batch"
        );
        Ok(summary)
    }

    /// Validate a JSON batch and apply it.
    pub fn apply_json(
        &self,
        height: BlockHeight,
        changes: &Value,
        timestamp: Option<Timestamp>,
    ) -> Result<BatchSummary> {
        let changes = changes_from_json(changes)?;
        self.apply_batch(height, &changes, timestamp)
    }

    /// Move the feed cursor forward. Older cursors are ignored.
    pub fn advance_cursor(&self, cursor: FeedCursor) {
        let mut state = self.state.write();
        if state.cursor.map_or(true, |current| cursor > current) {
            state.cursor = Some(cursor);
        }
    }

    // --- Reads ---

    pub fn get(&self, request: &GetRequest) -> Result<Value> {
        self.state.read().get(request)
    }

    pub fn keys(&self, request: &KeysRequest) -> Result<Value> {
        self.state.read().keys(request)
    }

    pub fn index(&self, request: &IndexRequest) -> Result<Vec<IndexEntry>> {
        self.state.read().index(request)
    }

    pub fn time(&self, request: &TimeRequest) -> Result<OneOrMany<Option<Timestamp>>> {
        self.state.read().time(request)
    }

    pub fn account_stats(&self, request: &AccountStatsRequest) -> Result<OneOrMany<Option<AccountCounters>>> {
        let state = self.state.read();
        let stats = state.account_stats(request)?;
        Ok(stats.map(|counters| counters.cloned()))
    }

    pub fn likes(&self, request: &LikesRequest) -> Result<OneOrMany<Vec<AccountId>>> {
        self.state.read().likes(request)
    }

    /// Serve a request as JSON text, from the cache when possible.
    pub fn handle(&self, request: &ApiRequest) -> Result<String> {
        let endpoint = request.endpoint();
        let key = request.cache_key()?;

        let state = self.state.read();
        if let Some(response) = self.cache.get(endpoint, &key) {
            return Ok(response);
        }
        let response = state.respond(request)?;
        self.cache.insert(endpoint, key, response.clone());
        Ok(response)
    }

    pub fn global_stats(&self) -> GlobalCounters {
        self.state.read().stats.global_stats().clone()
    }

    pub fn graph(&self, account_id: &str) -> Option<AccountGraph> {
        self.state.read().stats.graph(account_id).cloned()
    }

    /// Run `f` against the tree under the read lock.
    pub fn with_tree<R>(&self, f: impl FnOnce(&VersionedTree) -> R) -> R {
        f(&self.state.read().tree)
    }

    /// Events derived so far, in log order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.state.read().events.clone()
    }

    pub fn head(&self) -> Option<BlockHeight> {
        self.state.read().tree.head()
    }

    pub fn cursor(&self) -> Option<FeedCursor> {
        self.state.read().cursor
    }

    /// Summary counts of the store contents.
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            head: state.tree.head(),
            account_count: state.tree.account_count(),
            fact_count: state.index.len(),
            index_key_count: state.index.key_count(),
            event_count: state.events.len(),
            block_time_count: state.block_times.len(),
            cached_responses: self.cache.len(),
        }
    }

    // --- Persistence ---

    /// Write the snapshot if a path is configured. Returns whether one was written.
    ///
    /// Encoding happens under the read lock. The file is written after it is
    /// released.
    pub fn save_snapshot(&self) -> Result<bool> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(false);
        };
        let bytes = {
            let state = self.state.read();
            snapshot::encode(&SnapshotRef {
                tree: &state.tree,
                cursor: state.cursor,
                block_times: &state.block_times,
            })?
        };
        snapshot::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "Snapshot saved");
        Ok(true)
    }
}

/// Store content counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub head: Option<BlockHeight>,
    pub account_count: usize,
    pub fact_count: usize,
    pub index_key_count: usize,
    pub event_count: usize,
    pub block_time_count: usize,
    pub cached_responses: usize,
}
