//! Domain events derived from tree changes and index facts.
//!
//! A full rebuild replays every recorded height of the watched paths; after
//! that each applied batch appends its own events. Both produce the same log.

mod deriver;
mod types;

pub use deriver::{derive_all, derive_for_batch, events_from_facts};
pub use types::{index_event_type, DataPattern, DomainEvent, EventType, Processing, DATA_PATTERNS};
