//! Configuration Module
//!
//! Caller-facing validity configuration for a single `handle` call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Validity configuration carried by each `handle` call.
///
/// All knobs default to off: no expiry, no staleness, proactive eviction,
/// the entry outlives its resolution, and the default in-process backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Relative duration until the entry is expired and must be recomputed
    /// on access. `None` = no hard expiry.
    pub expire_in: Option<Duration>,
    /// Relative duration until the entry is stale: still servable, but the
    /// next access triggers a background refresh. `None` = never stale.
    pub stale_in: Option<Duration>,
    /// Enforce expiry only on access, never with a proactive timer.
    pub lazy_clear: bool,
    /// Delete the entry as soon as the computation resolves; the entry then
    /// only deduplicates concurrent callers.
    pub invalid_on_resolve: bool,
    /// Name of the registered backend to use. `None` = default backend.
    pub storage_key: Option<String>,
}

impl CacheConfig {
    /// Creates a config with every knob at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relative duration to absolute expiry.
    pub fn expire_in(mut self, duration: Duration) -> Self {
        self.expire_in = Some(duration);
        self
    }

    /// Sets the relative duration to absolute staleness.
    pub fn stale_in(mut self, duration: Duration) -> Self {
        self.stale_in = Some(duration);
        self
    }

    /// Enforces expiry on access only (no proactive eviction timer).
    pub fn lazy_clear(mut self, lazy_clear: bool) -> Self {
        self.lazy_clear = lazy_clear;
        self
    }

    /// Deletes the entry right after it resolves (dedup-only caching).
    pub fn invalid_on_resolve(mut self, invalid_on_resolve: bool) -> Self {
        self.invalid_on_resolve = invalid_on_resolve;
        self
    }

    /// Selects a named storage backend.
    pub fn storage_key(mut self, name: impl Into<String>) -> Self {
        self.storage_key = Some(name.into());
        self
    }

    /// Expiry duration in milliseconds, the unit entry timestamps use.
    pub(crate) fn expire_in_ms(&self) -> Option<u64> {
        self.expire_in.map(|d| d.as_millis() as u64)
    }

    /// Staleness duration in milliseconds.
    pub(crate) fn stale_in_ms(&self) -> Option<u64> {
        self.stale_in.map(|d| d.as_millis() as u64)
    }
}
