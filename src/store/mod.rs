//! Entry Store Module
//!
//! Pluggable key-value persistence for cache entries, plus the resolution
//! notification contract a backend must honor. The reference implementation
//! is the in-process [`MemoryStore`]; a remote backend is a drop-in
//! replacement as long as it keeps the same guarantees.

use async_trait::async_trait;

use crate::cache::{CacheEntry, Resolution, ResolutionWaiter};
use crate::error::Result;

mod memory;

pub use memory::MemoryStore;

// == Entry Store Trait ==
/// Storage collaborator contract.
///
/// Guarantees a conforming backend must provide:
/// - read-your-write: a `set` followed by a `get` for the same key (with no
///   intervening `delete`) observes the written entry;
/// - `get` on an absent key returns `Ok(None)`, never a default value;
/// - `emit_resolved` notifications reach every waiter registered via
///   [`EntryStore::on_resolved`] for that key at call time, exactly once
///   per call, in any process sharing the backend. Whether that is push,
///   poll, or long-poll is the backend's concern.
#[async_trait]
pub trait EntryStore<V>: Send + Sync {
    /// Fetches the entry stored at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>>;

    /// Stores `entry` at `key`, replacing any prior entry.
    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()>;

    /// Removes the entry at `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// Registers a waiter for the next resolution broadcast on `key`.
    fn on_resolved(&self, key: &str) -> ResolutionWaiter<V>;

    /// Broadcasts a computation's outcome to the key's current waiters.
    async fn emit_resolved(&self, key: &str, resolution: Resolution<V>) -> Result<()>;
}
