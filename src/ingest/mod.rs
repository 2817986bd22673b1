//! Change feed ingestion.
//!
//! An [`Ingestor`] pulls [`ChangeRecord`]s after the store's cursor, merges the
//! records of each block height into one batch and applies it. Batches that
//! fail validation are logged and skipped so the feed keeps moving.

mod feed;
mod poller;

pub use feed::{ChangeFeed, ChangeRecord, MemoryFeed};
pub use poller::{IngestConfig, IngestHandle, Ingestor, PollSummary};
