//! Eviction Scheduler Module
//!
//! Per-key timers that proactively remove expired entries. A timer is
//! bound to the entry id it was armed for; if the entry was superseded by
//! the time the timer fires, only the timer bookkeeping is cleared.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::locks::KeyLocks;
use crate::cache::stats::CacheStats;
use crate::store::EntryStore;

struct ArmedTimer {
    owner: Uuid,
    handle: JoinHandle<()>,
}

// == Eviction Scheduler ==
/// Schedules proactive removal of expired entries.
///
/// At most one armed timer exists per key; arming implicitly cancels the
/// prior one. Timers must additionally be cancelled whenever their owning
/// entry is replaced or deleted, and the owner id check at fire time guards
/// the window a cancellation can miss.
pub struct EvictionScheduler<V> {
    store: Arc<dyn EntryStore<V>>,
    locks: KeyLocks,
    stats: Arc<CacheStats>,
    timers: Arc<DashMap<String, ArmedTimer>>,
}

impl<V> Clone for EvictionScheduler<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
            stats: Arc::clone(&self.stats),
            timers: Arc::clone(&self.timers),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> EvictionScheduler<V> {
    // == Constructor ==
    /// Creates a scheduler evicting from `store`, serializing per-key work
    /// through `locks` (shared with the engine) and reporting to `stats`.
    pub fn new(store: Arc<dyn EntryStore<V>>, locks: KeyLocks, stats: Arc<CacheStats>) -> Self {
        Self {
            store,
            locks,
            stats,
            timers: Arc::new(DashMap::new()),
        }
    }

    // == Arm ==
    /// Schedules removal of the entry at `key` after `delay`, but only if
    /// the stored entry's id still equals `owner` at fire time.
    pub fn arm(&self, key: &str, delay: Duration, owner: Uuid) {
        self.cancel(key);

        let store = Arc::clone(&self.store);
        let locks = self.locks.clone();
        let stats = Arc::clone(&self.stats);
        let timers = Arc::clone(&self.timers);
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let _guard = locks.acquire(&task_key).await;
                match store.get(&task_key).await {
                    Ok(Some(entry)) if entry.id == owner => {
                        if let Err(error) = store.delete(&task_key).await {
                            warn!(key = %task_key, %error, "eviction delete failed");
                        } else {
                            stats.record_eviction();
                            debug!(key = %task_key, "evicted expired entry");
                        }
                    }
                    Ok(_) => {
                        debug!(key = %task_key, "eviction skipped, entry superseded or already gone");
                    }
                    Err(error) => {
                        warn!(key = %task_key, %error, "eviction lookup failed");
                    }
                }
            }

            // Clear our own bookkeeping unless a newer timer took the slot.
            timers.remove_if(&task_key, |_, timer| timer.owner == owner);
        });

        self.timers
            .insert(key.to_string(), ArmedTimer { owner, handle });
    }

    // == Cancel ==
    /// Cancels any pending timer for `key`.
    pub fn cancel(&self, key: &str) {
        if let Some((_, timer)) = self.timers.remove(key) {
            timer.handle.abort();
        }
    }

    /// Cancels every pending timer.
    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.timers.iter().map(|t| t.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Number of currently armed timers.
    pub fn armed(&self) -> usize {
        self.timers.len()
    }
}
