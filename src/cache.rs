//! Memoized query responses, valid until the next applied batch.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Endpoint name to serialized request to serialized response.
///
/// Each endpoint keeps its own bounded LRU map. The whole cache is cleared
/// after every batch, never partially.
pub struct QueryCache {
    capacity: NonZeroUsize,
    endpoints: Mutex<HashMap<&'static str, LruCache<String, String>>>,
}

impl QueryCache {
    /// Create a cache holding up to `capacity` responses per endpoint.
    ///
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, endpoint: &'static str, request: &str) -> Option<String> {
        self.endpoints
            .lock()
            .get_mut(endpoint)
            .and_then(|responses| responses.get(request).cloned())
    }

    pub fn insert(&self, endpoint: &'static str, request: String, response: String) {
        self.endpoints
            .lock()
            .entry(endpoint)
            .or_insert_with(|| LruCache::new(self.capacity))
            .put(request, response);
    }

    /// Drop every cached response.
    pub fn clear(&self) {
        self.endpoints.lock().clear();
    }

    /// Number of cached responses across endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.lock().values().map(LruCache::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
