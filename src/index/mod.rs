//! Secondary index built from the reserved `<account>/index/<action>` paths.
//!
//! Every leaf written there is a JSON payload of one or more `{key, value}`
//! objects. Each object becomes an [`IndexFact`], appended to the log for its
//! canonical key and action. Logs are ordered by height and queried with a
//! height cursor and a soft limit.

mod engine;
mod fact;

pub use engine::{IndexEngine, IndexEntry, IndexQuery, Order, INDEX_PATH};
pub use fact::{canonical_json, canonicalize, IndexFact, IndexKey};
