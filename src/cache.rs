//! Generation-stamped LRU cache for query results.
//!
//! Keys are normalized query text (case-folded, whitespace-collapsed) plus
//! the requested top-k, so requests that differ only in `k` cannot alias.
//! Entries carry the store generation they were computed against; a bumped
//! generation makes every older entry a miss, which is the whole
//! invalidation story — the store never notifies the cache.
//!
//! The cache is purely an optimization layer: `get_or_compute` runs the
//! compute closure outside the lock, so its absence could never change
//! results, only latency.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;

use crate::models::SearchHit;

/// Cache key: normalized query text plus requested result count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    text: String,
    k: usize,
}

impl QueryKey {
    pub fn new(raw_query: &str, k: usize) -> Self {
        Self {
            text: normalize_query(raw_query),
            k,
        }
    }
}

/// Case-fold and collapse whitespace so trivially-different spellings of a
/// query share one entry.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

struct CachedEntry {
    generation: u64,
    results: Vec<SearchHit>,
}

pub struct QueryCache {
    entries: Mutex<LruCache<QueryKey, CachedEntry>>,
    hits: AtomicU64,
    lookups: AtomicU64,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    /// Return the cached results for `key` if they were computed against
    /// `generation`; otherwise run `compute`, store, and return its output.
    ///
    /// The closure runs without the cache lock held. Eviction of the
    /// least-recently-used entry on overflow is handled by the backing
    /// [`LruCache`] in O(1).
    pub fn get_or_compute<F>(&self, key: QueryKey, generation: u64, compute: F) -> Vec<SearchHit>
    where
        F: FnOnce() -> Vec<SearchHit>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(&key) {
                if entry.generation == generation {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return entry.results.clone();
                }
            }
        }

        let results = compute();

        let mut entries = self.entries.lock().unwrap();
        entries.put(
            key,
            CachedEntry {
                generation,
                results: results.clone(),
            },
        );
        results
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime (hits, lookups) counters for the status report.
    pub fn hit_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.lookups.load(Ordering::Relaxed),
        )
    }
}
