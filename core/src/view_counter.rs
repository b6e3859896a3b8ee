//! Best-effort product view counter.
//!
//! Counts live under `product:{id}:views` with no TTL and only change
//! through atomic increments (or an explicit reset). Failures are logged and
//! dropped: a lost view is an analytics blip, not a correctness problem.

use crate::keys::product_views;
use crate::kv::KeyValueStore;
use crate::metrics::{VIEW_ERRORS, VIEW_INCREMENTS};
use ::metrics::counter;
use std::sync::Arc;

/// Atomic per-product view counter.
pub struct ViewCounter<S> {
    store: Arc<S>,
}

impl<S> Clone for ViewCounter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> ViewCounter<S> {
    /// Create a counter over the shared store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add `delta` views to `product_id`.
    ///
    /// Returns the new count, or `None` if the increment was dropped.
    pub async fn increment(&self, product_id: u64, delta: i64) -> Option<i64> {
        let key = product_views(product_id);
        match self.store.incr_by(&key, delta).await {
            Ok(count) => {
                counter!(VIEW_INCREMENTS).increment(1);
                tracing::trace!(product_id, count, "View recorded");
                Some(count)
            }
            Err(e) => {
                counter!(VIEW_ERRORS).increment(1);
                tracing::warn!(
                    error = %e,
                    product_id,
                    delta,
                    "Dropping view count increment"
                );
                None
            }
        }
    }

    /// Current count for `product_id`.
    ///
    /// A product never viewed counts `0`. Returns `None` if the store failed
    /// or holds something that is not an integer.
    pub async fn count(&self, product_id: u64) -> Option<i64> {
        let key = product_views(product_id);
        match self.store.get(&key).await {
            Ok(None) => Some(0),
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "View count is not an integer");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "View count read failed");
                None
            }
        }
    }

    /// Reset the count for `product_id` to zero.
    ///
    /// Returns `false` if the store failed.
    pub async fn reset(&self, product_id: u64) -> bool {
        let key = product_views(product_id);
        match self.store.delete(&key).await {
            Ok(_) => {
                tracing::info!(product_id, "View count reset");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, product_id, "View count reset failed");
                false
            }
        }
    }
}
