//! Per-account and global statistics folded from the event log.

mod aggregator;
mod counter;
mod rules;

pub use aggregator::{AccountGraph, StatsAggregator};
pub use counter::{AccountCounters, GlobalCounters, GlobalStat, StatValue};
