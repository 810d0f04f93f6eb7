//! Error types for the memoization cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the memoization cache.
///
/// The enum is cloneable so that a single resolution outcome can be
/// broadcast to every waiter of a computation; producer errors are wrapped
/// in an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// No key parts were supplied
    #[error("Cache key is required")]
    EmptyKey,

    /// A key part was an empty string
    #[error("Cache key parts may not be empty")]
    EmptyKeyPart,

    /// A key part contained the reserved delimiter
    #[error("Cache key part {0:?} may not contain the \"::\" delimiter")]
    ReservedDelimiter(String),

    /// The producer computation itself failed
    #[error("Producer failed: {0}")]
    Producer(Arc<anyhow::Error>),

    /// A storage backend operation failed
    #[error("Storage backend error: {0}")]
    Storage(String),

    /// `storage_key` named a backend that was never registered
    #[error("Storage backend not registered: {0}")]
    UnknownBackend(String),

    /// A resolution waiter's channel closed without a broadcast
    #[error("Resolution lost for key {0}: channel closed before a result was published")]
    ResolutionLost(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps a producer failure for propagation and broadcast.
    pub fn producer(error: anyhow::Error) -> Self {
        Self::Producer(Arc::new(error))
    }

    /// True for the validation errors raised before any computation starts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyKey | Self::EmptyKeyPart | Self::ReservedDelimiter(_)
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the memoization cache.
pub type Result<T> = std::result::Result<T, CacheError>;
