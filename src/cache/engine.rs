//! Cache Engine Module
//!
//! The orchestrator: consumes the entry store, resolution notifications,
//! and the eviction scheduler to implement the handle/trigger protocol.
//! Given a key, a producer, and a validity configuration, the engine
//! decides whether to return an already-resolved value, await an in-flight
//! computation, trigger a fresh one, or refresh in the background while
//! serving the stale value.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::bus::ResolutionWaiter;
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::locks::KeyLocks;
use crate::cache::scheduler::EvictionScheduler;
use crate::cache::stats::CacheStats;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::store::EntryStore;

/// How a call that did not trigger its own computation gets its value: the
/// entry was already resolved, or the call rides an in-flight computation
/// through a resolution waiter.
enum Ride<V> {
    Resolved(CacheEntry<V>),
    Waiter(ResolutionWaiter<V>),
}

// == Cache Engine ==
/// Orchestrates lookups, triggers, and background refreshes over one
/// storage backend.
///
/// All per-key mutations (entry replacement, eviction, resolution
/// persistence) run inside that key's critical section, so no caller can
/// observe a half-replaced entry; different keys proceed fully in
/// parallel.
pub struct CacheEngine<V> {
    store: Arc<dyn EntryStore<V>>,
    scheduler: EvictionScheduler<V>,
    locks: KeyLocks,
    stats: Arc<CacheStats>,
}

impl<V> Clone for CacheEngine<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            scheduler: self.scheduler.clone(),
            locks: self.locks.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CacheEngine<V> {
    // == Constructor ==
    /// Creates an engine over the given storage backend.
    pub fn new(store: Arc<dyn EntryStore<V>>) -> Self {
        let locks = KeyLocks::new();
        let stats = Arc::new(CacheStats::new());
        let scheduler = EvictionScheduler::new(Arc::clone(&store), locks.clone(), Arc::clone(&stats));
        Self {
            store,
            scheduler,
            locks,
            stats,
        }
    }

    /// The storage backend this engine runs over.
    pub fn store(&self) -> &Arc<dyn EntryStore<V>> {
        &self.store
    }

    /// Performance counters for this engine.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    // == Handle ==
    /// Memoizes `producer` under `key`.
    ///
    /// Exactly one of four things happens:
    /// - the entry is missing or expired: the producer runs and this call
    ///   returns its outcome;
    /// - the entry is stale: a background refresh is spawned and this call
    ///   resolves from the pre-existing entry;
    /// - the entry is fresh and resolved: its value is returned;
    /// - the entry is fresh and pending: this call waits for the in-flight
    ///   computation's resolution broadcast.
    ///
    /// A supplied `stale_in` on a non-triggering call pushes the stored
    /// entry's staleness out to `now + stale_in` without restarting the
    /// computation.
    ///
    /// # Errors
    /// The producer's failure, for the triggering caller and for every
    /// waiter of that computation. Failed computations are never cached.
    pub async fn handle<F, Fut>(&self, key: &CacheKey, producer: F, config: &CacheConfig) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let mut producer = Some(producer);

        loop {
            // Classification and entry replacement are atomic per key.
            let guard = self.locks.acquire(key.as_str()).await;
            let existing = match self.store.get(key.as_str()).await {
                Ok(existing) => existing,
                Err(error) => {
                    warn!(key = %key, %error, "storage get failed, treating as miss");
                    None
                }
            };
            let now = current_timestamp_ms();

            // Missing or expired: compute fresh and return the outcome.
            let Some(entry) = existing.filter(|entry| !entry.is_expired_for(config, now)) else {
                self.stats.record_miss();
                let pending = self.register(key.as_str(), config, now).await;
                drop(guard);

                let producer = Self::take_producer(&mut producer, key)?;
                let resolved = self.complete(pending, producer()).await?;
                return Self::entry_value(resolved);
            };

            if entry.is_stale(now) {
                self.stats.record_hit();
                self.stats.record_refresh();

                // Capture the previous computation before the trigger
                // replaces it; this call resolves from the old entry, never
                // from the refresh.
                let ride = if entry.is_resolved() {
                    Ride::Resolved(entry)
                } else {
                    Ride::Waiter(self.store.on_resolved(key.as_str()))
                };

                let pending = self.register(key.as_str(), config, now).await;
                let producer = Self::take_producer(&mut producer, key)?;
                let computation = producer();
                let engine = self.clone();
                tokio::spawn(async move {
                    if let Err(error) = engine.complete(pending, computation).await {
                        debug!(%error, "background refresh failed");
                    }
                });
                drop(guard);

                return match ride {
                    Ride::Resolved(entry) => Self::entry_value(entry),
                    Ride::Waiter(waiter) => Self::entry_value(waiter.wait().await?),
                };
            }

            // Fresh. The most recent caller's stale_in extends staleness.
            let entry = self.extend_staleness(entry, config, now).await;

            if entry.is_resolved() {
                self.stats.record_hit();
                return Self::entry_value(entry);
            }

            // Pending: subscribe before re-checking the store so a
            // resolution landing in between cannot be missed.
            let waiter = self.store.on_resolved(key.as_str());
            let recheck = match self.store.get(key.as_str()).await {
                Ok(recheck) => recheck,
                Err(error) => {
                    warn!(key = %key, %error, "storage get failed on re-check");
                    None
                }
            };
            match recheck {
                Some(current) if current.id == entry.id => {
                    self.stats.record_hit();
                    if current.is_resolved() {
                        waiter.unsubscribe();
                        return Self::entry_value(current);
                    }
                    drop(guard);
                    return Self::entry_value(waiter.wait().await?);
                }
                _ => {
                    // Resolved-and-vanished or superseded between the
                    // lookup and the subscription; classify again.
                    waiter.unsubscribe();
                    drop(guard);
                }
            }
        }
    }

    // == Invalidate ==
    /// Deletes the entry at `key` and cancels its eviction timer.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let _guard = self.locks.acquire(key.as_str()).await;
        self.scheduler.cancel(key.as_str());
        self.store.delete(key.as_str()).await
    }

    // == Clear ==
    /// Cancels every eviction timer and removes every entry.
    pub async fn clear(&self) -> Result<()> {
        self.scheduler.cancel_all();
        self.store.clear().await
    }

    // == Trigger ==
    /// Replaces whatever occupies `key` with a fresh pending entry and arms
    /// its eviction timer. The caller must hold the key's critical section.
    async fn register(&self, key: &str, config: &CacheConfig, now: u64) -> CacheEntry<V> {
        self.scheduler.cancel(key);
        if let Err(error) = self.store.delete(key).await {
            warn!(key = %key, %error, "storage delete failed while replacing entry");
        }

        let entry = CacheEntry::pending(key, config, now);
        if let Err(error) = self.store.set(key, entry.clone()).await {
            warn!(key = %key, %error, "storage set failed while registering entry");
        }

        if !entry.lazy_clear {
            if let Some(delay) = entry.ttl_remaining_ms(now) {
                self.scheduler.arm(key, Duration::from_millis(delay), entry.id);
            }
        }

        entry
    }

    // == Completion ==
    /// Runs a computation to completion, persists and broadcasts its
    /// outcome, and returns it.
    ///
    /// The outcome goes back to the triggering caller unconditionally, but
    /// the store is only touched while this computation still owns the key:
    /// a superseded computation's result is discarded on arrival, and its
    /// failure never deletes the entry that superseded it. Storage failures
    /// here are logged and swallowed so the caller still gets the
    /// producer's outcome.
    async fn complete<Fut>(&self, pending: CacheEntry<V>, computation: Fut) -> Result<CacheEntry<V>>
    where
        Fut: Future<Output = anyhow::Result<V>> + Send,
    {
        let key = pending.key.clone();

        match computation.await {
            Ok(value) => {
                let _guard = self.locks.acquire(&key).await;
                let current = match self.store.get(&key).await {
                    Ok(current) => current,
                    Err(error) => {
                        warn!(key = %key, %error, "storage get failed after resolution");
                        None
                    }
                };

                // Resolve onto the stored entry when still the owner, so a
                // staleness extension applied mid-flight is kept.
                let (mut resolved, owned) = match current {
                    Some(current) if current.id == pending.id => (current, true),
                    _ => (pending, false),
                };
                resolved.resolve(value, current_timestamp_ms());

                if owned {
                    if let Err(error) = self.store.set(&key, resolved.clone()).await {
                        warn!(key = %key, %error, "storage set failed after resolution");
                    }
                }

                // Broadcast after the store update so waiters re-checking
                // the store observe the resolved entry.
                if let Err(error) = self.store.emit_resolved(&key, Ok(resolved.clone())).await {
                    warn!(key = %key, %error, "resolution broadcast failed");
                }

                if owned && resolved.invalid_on_resolve {
                    self.scheduler.cancel(&key);
                    if let Err(error) = self.store.delete(&key).await {
                        warn!(key = %key, %error, "storage delete failed for dedup-only entry");
                    }
                }

                Ok(resolved)
            }
            Err(error) => {
                let error = CacheError::producer(error);
                let _guard = self.locks.acquire(&key).await;

                let owned = matches!(
                    self.store.get(&key).await,
                    Ok(Some(current)) if current.id == pending.id
                );
                if owned {
                    // Failed computations are never cached.
                    self.scheduler.cancel(&key);
                    if let Err(delete_error) = self.store.delete(&key).await {
                        warn!(key = %key, error = %delete_error, "storage delete failed after producer failure");
                    }
                }

                if let Err(emit_error) = self.store.emit_resolved(&key, Err(error.clone())).await {
                    warn!(key = %key, error = %emit_error, "failure broadcast failed");
                }

                Err(error)
            }
        }
    }

    /// Pushes the stored entry's `stale_at` out to `now + stale_in` when
    /// the calling config supplies one.
    async fn extend_staleness(
        &self,
        mut entry: CacheEntry<V>,
        config: &CacheConfig,
        now: u64,
    ) -> CacheEntry<V> {
        let Some(stale_ms) = config.stale_in_ms() else {
            return entry;
        };
        entry.stale_at = Some(now.saturating_add(stale_ms));
        if let Err(error) = self.store.set(&entry.key, entry.clone()).await {
            warn!(key = %entry.key, %error, "storage set failed while extending staleness");
        }
        entry
    }

    fn take_producer<F>(producer: &mut Option<F>, key: &CacheKey) -> Result<F> {
        producer.take().ok_or_else(|| {
            CacheError::Internal(format!("producer for key {key} consumed twice"))
        })
    }

    fn entry_value(entry: CacheEntry<V>) -> Result<V> {
        let CacheEntry { key, value, .. } = entry;
        value.ok_or_else(|| {
            CacheError::Internal(format!("resolved entry for key {key} is missing its value"))
        })
    }
}
