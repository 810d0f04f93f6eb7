//! In-Memory Store
//!
//! Reference in-process backend: a map guarded by an async RwLock plus a
//! [`ResolutionBus`] for the notification contract. All operations are
//! async-capable even though the backing memory is synchronous, so a remote
//! implementation is a drop-in replacement.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, Resolution, ResolutionBus, ResolutionWaiter};
use crate::error::Result;
use crate::store::EntryStore;

// == Memory Store ==
/// In-process entry store.
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    bus: ResolutionBus<V>,
}

impl<V> MemoryStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            bus: ResolutionBus::new(),
        }
    }

    // == Length ==
    /// Returns the current number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> EntryStore<V> for MemoryStore<V> {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry<V>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn on_resolved(&self, key: &str) -> ResolutionWaiter<V> {
        self.bus.subscribe(key)
    }

    async fn emit_resolved(&self, key: &str, resolution: Resolution<V>) -> Result<()> {
        self.bus.publish(key, resolution);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::current_timestamp_ms;
    use crate::config::CacheConfig;

    fn entry(key: &str, value: &str) -> CacheEntry<String> {
        let now = current_timestamp_ms();
        let mut entry = CacheEntry::pending(key, &CacheConfig::new(), now);
        entry.resolve(value.to_string(), now);
        entry
    }

    #[tokio::test]
    async fn test_read_your_write() {
        let store: MemoryStore<String> = MemoryStore::new();
        let written = entry("k", "value");

        store.set("k", written.clone()).await.unwrap();
        let read = store.get("k").await.unwrap().unwrap();

        assert_eq!(read.id, written.id);
        assert_eq!(read.value.as_deref(), Some("value"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_absent_key_is_none() {
        let store: MemoryStore<String> = MemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_prior_entry() {
        let store: MemoryStore<String> = MemoryStore::new();
        store.set("k", entry("k", "first")).await.unwrap();
        store.set("k", entry("k", "second")).await.unwrap();

        let read = store.get("k").await.unwrap().unwrap();
        assert_eq!(read.value.as_deref(), Some("second"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store: MemoryStore<String> = MemoryStore::new();
        store.set("k", entry("k", "value")).await.unwrap();

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // Deleting an absent key is not an error
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store: MemoryStore<String> = MemoryStore::new();
        store.set("a", entry("a", "1")).await.unwrap();
        store.set("b", entry("b", "2")).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_resolution_notifications_roundtrip() {
        let store: MemoryStore<String> = MemoryStore::new();
        let waiter = store.on_resolved("k");

        store.emit_resolved("k", Ok(entry("k", "value"))).await.unwrap();

        let resolved = waiter.wait().await.unwrap();
        assert_eq!(resolved.value.as_deref(), Some("value"));
    }
}
