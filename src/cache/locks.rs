//! Key Locks Module
//!
//! Per-key critical sections. Entry replacement must be atomic relative to
//! concurrent lookups on the same key, while operations on different keys
//! proceed in parallel, so each key gets its own mutex rather than the
//! whole cache sharing one.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per cache key.
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the critical section for `key`, suspending while another
    /// caller holds it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }
}
