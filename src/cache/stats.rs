//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, background
//! refreshes, and timer evictions.

use std::sync::atomic::{AtomicU64, Ordering};

// == Cache Stats ==
/// Tracks cache performance metrics.
///
/// Counters are atomic so the engine, background refreshes, and eviction
/// timers can all record without coordination.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Calls served from an existing entry (fresh or stale)
    hits: AtomicU64,
    /// Calls that had to trigger a fresh computation
    misses: AtomicU64,
    /// Background refreshes fired for stale entries
    refreshes: AtomicU64,
    /// Entries removed by a fired eviction timer
    evictions: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Refresh ==
    /// Increments the background refresh counter.
    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
