//! Transport-agnostic query API.
//!
//! Requests are plain serde structs accepting both snake_case and camelCase
//! option names. [`Store::handle`](crate::Store::handle) validates a request,
//! serves it from the per-batch cache when possible and returns JSON text.

mod requests;

pub use requests::{
    AccountStatsRequest, ApiRequest, GetRequest, IndexRequest, KeysRequest, LikesRequest,
    TimeRequest,
};
