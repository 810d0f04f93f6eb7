//! Resolution Bus Module
//!
//! Per-key publish/subscribe that lets any number of waiters learn when an
//! in-flight computation finishes, independent of who started it. Callers
//! rendezvous on a key, not on a shared future.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::cache::entry::CacheEntry;
use crate::error::{CacheError, Result};

// == Resolution ==
/// The broadcast outcome of one computation: the resolved entry, or the
/// error the producer failed with.
pub type Resolution<V> = std::result::Result<CacheEntry<V>, CacheError>;

type WaiterSlots<V> = DashMap<String, Vec<(u64, oneshot::Sender<Resolution<V>>)>>;

struct BusInner<V> {
    waiters: WaiterSlots<V>,
    next_token: AtomicU64,
}

// == Resolution Bus ==
/// Per-key publish/subscribe for computation outcomes.
///
/// Each subscription receives at most the next broadcast for its key; a
/// broadcast drains every waiter registered at publish time, exactly once
/// per publish. The bus is the in-process realization of the storage
/// collaborator's `on_resolved`/`emit_resolved` contract, and backends are
/// free to embed one.
pub struct ResolutionBus<V> {
    inner: Arc<BusInner<V>>,
}

impl<V> Clone for ResolutionBus<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for ResolutionBus<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResolutionBus<V> {
    // == Constructor ==
    /// Creates a bus with no subscriptions.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                waiters: DashMap::new(),
                next_token: AtomicU64::new(0),
            }),
        }
    }

    /// Number of waiters currently registered for `key`.
    pub fn waiter_count(&self, key: &str) -> usize {
        self.inner.waiters.get(key).map_or(0, |slots| slots.len())
    }
}

impl<V: Clone + Send + 'static> ResolutionBus<V> {
    // == Subscribe ==
    /// Registers a waiter for the next broadcast on `key`.
    ///
    /// The returned waiter must be subscribed *before* re-checking the
    /// store for an already-resolved entry, so a resolution landing between
    /// the check and the subscription cannot be missed. If the re-check
    /// short-circuits, call [`ResolutionWaiter::unsubscribe`] (dropping the
    /// waiter has the same effect).
    pub fn subscribe(&self, key: &str) -> ResolutionWaiter<V> {
        let (tx, rx) = oneshot::channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner
            .waiters
            .entry(key.to_string())
            .or_default()
            .push((token, tx));

        let inner = Arc::clone(&self.inner);
        let slot_key = key.to_string();
        ResolutionWaiter::new(
            key,
            rx,
            Box::new(move || {
                if let Some(mut slots) = inner.waiters.get_mut(&slot_key) {
                    slots.retain(|(t, _)| *t != token);
                }
            }),
        )
    }

    // == Publish ==
    /// Broadcasts a computation's outcome to every waiter currently
    /// registered for `key`, then clears them.
    ///
    /// Invoked exactly once per computation, after the entry store has been
    /// updated, so waiters that re-check the store observe the update.
    pub fn publish(&self, key: &str, resolution: Resolution<V>) {
        let Some((_, slots)) = self.inner.waiters.remove(key) else {
            return;
        };
        debug!(key = %key, waiters = slots.len(), "broadcasting resolution");
        for (_, tx) in slots {
            // A waiter that unsubscribed concurrently just drops its half.
            let _ = tx.send(resolution.clone());
        }
    }
}

// == Resolution Waiter ==
/// A single-use subscription to the next resolution broadcast for a key.
///
/// Unsubscribing is idempotent and also happens on drop, so abandoning a
/// waiter never leaks its slot. Backends other than the in-process one can
/// construct waiters over their own delivery mechanism with
/// [`ResolutionWaiter::new`].
pub struct ResolutionWaiter<V> {
    key: String,
    rx: Option<oneshot::Receiver<Resolution<V>>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl<V> ResolutionWaiter<V> {
    /// Wraps a receiving channel and a deregistration hook into a waiter.
    pub fn new(
        key: impl Into<String>,
        rx: oneshot::Receiver<Resolution<V>>,
        cancel: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            key: key.into(),
            rx: Some(rx),
            cancel: Some(cancel),
        }
    }

    /// The key this waiter is subscribed to.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Wait ==
    /// Suspends until the next broadcast for the key and returns its
    /// outcome.
    ///
    /// # Errors
    /// - the broadcast error, if the computation failed
    /// - [`CacheError::ResolutionLost`] if the channel closed without a
    ///   broadcast
    pub async fn wait(mut self) -> Result<CacheEntry<V>> {
        let Some(rx) = self.rx.take() else {
            return Err(CacheError::Internal(format!(
                "resolution waiter for key {} polled twice",
                self.key
            )));
        };
        match rx.await {
            Ok(resolution) => resolution,
            Err(_) => Err(CacheError::ResolutionLost(self.key.clone())),
        }
    }

    // == Unsubscribe ==
    /// Deregisters the waiter. Idempotent; also performed on drop.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<V> Drop for ResolutionWaiter<V> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
