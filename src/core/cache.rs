//! LRU cache for enforcement decisions
//!
//! Keyed by the full request tuple. Only valid while policies and bound
//! functions are unchanged; the enforcer clears it on every policy mutation.

use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache of request tuple -> decision
pub struct DecisionCache {
    cache: LruCache<Vec<String>, bool>,
}

impl DecisionCache {
    /// Create a cache holding up to `capacity` decisions (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        DecisionCache {
            cache: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, request: &[&str]) -> Option<bool> {
        self.cache.get(&key(request)).copied()
    }

    pub fn put(&mut self, request: &[&str], decision: bool) {
        self.cache.put(key(request), decision);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

fn key(request: &[&str]) -> Vec<String> {
    request.iter().map(|s| s.to_string()).collect()
}
