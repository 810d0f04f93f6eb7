//! Cache Module
//!
//! Memoizes async computations per key: concurrent callers coalesce onto a
//! single in-flight computation, results are reused within their validity
//! window, and stale entries refresh in the background while still serving
//! the old value.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

mod bus;
mod engine;
mod entry;
mod locks;
mod scheduler;
mod stats;


// Re-export public types
pub use bus::{Resolution, ResolutionBus, ResolutionWaiter};
pub use engine::CacheEngine;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use locks::KeyLocks;
pub use scheduler::EvictionScheduler;
pub use stats::CacheStats;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::store::{EntryStore, MemoryStore};

// == Cache ==
/// The caller-facing cache: one engine per registered storage backend.
///
/// The default backend is the in-process [`MemoryStore`]; additional named
/// backends can be registered and selected per call via
/// [`CacheConfig::storage_key`]. Each backend gets its own engine, and with
/// it its own eviction timers and counters.
pub struct Cache<V> {
    default_engine: CacheEngine<V>,
    backends: HashMap<String, CacheEngine<V>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    // == Constructor ==
    /// Creates a cache backed by a fresh in-process store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Creates a cache whose default backend is `store`.
    pub fn with_store(store: Arc<dyn EntryStore<V>>) -> Self {
        Self {
            default_engine: CacheEngine::new(store),
            backends: HashMap::new(),
        }
    }

    /// Registers an additional named backend.
    pub fn with_backend(mut self, name: impl Into<String>, store: Arc<dyn EntryStore<V>>) -> Self {
        self.backends.insert(name.into(), CacheEngine::new(store));
        self
    }

    // == Handle ==
    /// Memoizes `producer` under `key` on the backend `config` selects.
    ///
    /// See [`CacheEngine::handle`] for the full decision protocol.
    ///
    /// # Errors
    /// - [`CacheError::UnknownBackend`] if `config.storage_key` names a
    ///   backend that was never registered (raised before the producer
    ///   runs)
    /// - the producer's failure, which is never cached
    pub async fn handle<F, Fut>(&self, key: &CacheKey, producer: F, config: &CacheConfig) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.engine_for(config)?.handle(key, producer, config).await
    }

    // == Invalidate ==
    /// Deletes `key` from the default backend.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.default_engine.invalidate(key).await
    }

    // == Clear ==
    /// Clears the default backend and every named backend.
    pub async fn clear(&self) -> Result<()> {
        self.default_engine.clear().await?;
        for engine in self.backends.values() {
            engine.clear().await?;
        }
        Ok(())
    }

    /// The default backend's engine.
    pub fn engine(&self) -> &CacheEngine<V> {
        &self.default_engine
    }

    /// A named backend's engine, if registered.
    pub fn backend(&self, name: &str) -> Option<&CacheEngine<V>> {
        self.backends.get(name)
    }

    /// The default backend's performance counters.
    pub fn stats(&self) -> &CacheStats {
        self.default_engine.stats()
    }

    fn engine_for(&self, config: &CacheConfig) -> Result<&CacheEngine<V>> {
        match &config.storage_key {
            None => Ok(&self.default_engine),
            Some(name) => self
                .backends
                .get(name)
                .ok_or_else(|| CacheError::UnknownBackend(name.clone())),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}
