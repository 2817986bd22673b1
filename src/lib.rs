//! # Social Chronicle
//!
//! A block-height versioned key space for social data, with time-travel
//! queries, secondary indexes, derived events and per-account stats.
//!
//! ## Core Concepts
//!
//! - **Tree**: Every key keeps its full value history by block height
//! - **Queries**: `get` and `keys` walk path patterns at any past height
//! - **Index**: Facts written under `index/*` are queryable by key and action
//! - **Events**: Writes matching known paths become typed domain events
//! - **Stats**: Events fold into per-account and global counters
//!
//! ## Example
//!
//! ```ignore
//! use social_chronicle::{GetRequest, Store, StoreConfig, BlockHeight};
//!
//! let store = Store::open(StoreConfig::with_snapshot("./chronicle.snapshot"))?;
//!
//! store.apply_json(
//!     BlockHeight(100),
//!     &json!({"alice.near": {"profile": {"name": "Alice"}}}),
//!     None,
//! )?;
//!
//! let profile = store.get(&GetRequest::new(["*/profile/**"]))?;
//! let earlier = store.get(&GetRequest::new(["*/profile/**"]).at(BlockHeight(50)))?;
//! ```

pub mod api;
pub mod cache;
pub mod error;
pub mod events;
pub mod index;
pub mod ingest;
pub mod query;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod tree;
pub mod types;

// Re-exports
pub use api::{
    AccountStatsRequest, ApiRequest, GetRequest, IndexRequest, KeysRequest, LikesRequest,
    TimeRequest,
};
pub use error::{RequestError, Result, StoreError, StructuralError};
pub use events::{DomainEvent, EventType};
pub use index::{IndexEntry, IndexQuery, Order};
pub use ingest::{ChangeFeed, ChangeRecord, IngestConfig, IngestHandle, Ingestor, MemoryFeed};
pub use query::{GetOptions, KeysOptions, KeysReturnType};
pub use stats::{AccountCounters, AccountGraph, GlobalCounters, StatsAggregator};
pub use store::{BatchSummary, Store, StoreConfig, StoreStats};
pub use tree::{changes_from_json, Change, Changes, VersionedTree};
pub use types::*;
