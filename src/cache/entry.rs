//! Cache Entry Module
//!
//! Defines the unit of cached state: one computation's outcome for a key.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CacheConfig;

// == Cache Entry ==
/// The cached representation of one computation for a key.
///
/// An entry is registered in a pending state when a computation is
/// triggered, and mutated exactly once when the computation resolves
/// (`value` and `resolved_at` set together). Failed computations never
/// leave an entry behind.
///
/// The `id` is minted per entry; successive entries for the same key carry
/// different ids, which is how superseded computations and stale eviction
/// timers are detected.
///
/// Entries are serializable so that a remote backend can store them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Opaque token distinguishing this entry from any other for the key
    pub id: Uuid,
    /// The joined cache key
    pub key: String,
    /// The computed value; `None` while the computation is in flight
    pub value: Option<V>,
    /// Registration timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Resolution timestamp (Unix milliseconds); `None` while pending
    pub resolved_at: Option<u64>,
    /// Absolute expiry timestamp (Unix milliseconds), None = no expiry
    pub expires_at: Option<u64>,
    /// Absolute staleness timestamp (Unix milliseconds), None = never stale
    pub stale_at: Option<u64>,
    /// Expiry is enforced on access only, never by a proactive timer
    pub lazy_clear: bool,
    /// Delete the entry immediately once it resolves
    pub invalid_on_resolve: bool,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a pending entry for a freshly triggered computation.
    ///
    /// # Arguments
    /// * `key` - The joined cache key
    /// * `config` - The triggering call's validity configuration
    /// * `now` - Registration timestamp in Unix milliseconds
    pub fn pending(key: impl Into<String>, config: &CacheConfig, now: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            value: None,
            created_at: now,
            resolved_at: None,
            expires_at: config.expire_in_ms().map(|ms| now.saturating_add(ms)),
            stale_at: config.stale_in_ms().map(|ms| now.saturating_add(ms)),
            lazy_clear: config.lazy_clear,
            invalid_on_resolve: config.invalid_on_resolve,
        }
    }

    // == Resolve ==
    /// Records the computation's value and resolution time.
    pub fn resolve(&mut self, value: V, now: u64) {
        self.value = Some(value);
        self.resolved_at = Some(now);
    }

    /// Whether the computation behind this entry has finished.
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiry time, so an entry created with a
    /// zero expiry duration is expired by any later access.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks expiry including the calling config's `expire_in` override.
    ///
    /// A caller may pass a tighter `expire_in` than the one the entry was
    /// created with; the entry is then also expired once
    /// `created_at + expire_in` has elapsed.
    pub fn is_expired_for(&self, config: &CacheConfig, now: u64) -> bool {
        if self.is_expired(now) {
            return true;
        }
        match config.expire_in_ms() {
            Some(ms) => self.created_at.saturating_add(ms) <= now,
            None => false,
        }
    }

    // == Is Stale ==
    /// Checks if the entry is stale: still servable, but old enough that
    /// the next access must trigger a background refresh.
    pub fn is_stale(&self, now: u64) -> bool {
        match self.stale_at {
            Some(stale) => now >= stale,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining time until expiry in milliseconds, or None if no
    /// expiry is set. Used to arm the eviction timer.
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
