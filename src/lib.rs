//! Memocache - A lightweight async memoization cache
//!
//! Memoizes the result of an async computation under a caller-supplied
//! key: repeated calls within the validity window reuse one result,
//! concurrent callers for a key coalesce onto a single in-flight
//! computation, and stale entries are refreshed in the background while
//! the old value is still served.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod store;

pub use cache::{Cache, CacheEngine, CacheEntry, CacheStats, Resolution, ResolutionBus, ResolutionWaiter};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::{CacheKey, KEY_DELIMITER};
pub use store::{EntryStore, MemoryStore};
