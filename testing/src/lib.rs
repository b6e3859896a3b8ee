//! # Storefront Testing
//!
//! Testing utilities for the storefront traffic-shaping layer.
//!
//! This crate provides:
//! - [`InMemoryKeyValueStore`]: a shared-store fake with TTL emulation
//! - [`FailingKeyValueStore`]: a store that is always unreachable
//! - [`ManualClock`]: deterministic time that tests advance explicitly
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use storefront_core::{IdempotencyGate, IdempotencyKey};
//! use storefront_testing::{test_clock, InMemoryKeyValueStore};
//!
//! # tokio_test::block_on(async {
//! let clock = test_clock();
//! let store = Arc::new(InMemoryKeyValueStore::with_clock(clock.clone()));
//! let gate = IdempotencyGate::new(store, Duration::from_secs(1));
//! let key = IdempotencyKey::new("member-1", "POST", "/api/orders");
//!
//! assert!(gate.try_acquire(&key).await);
//! assert!(!gate.try_acquire(&key).await);
//!
//! clock.advance(Duration::from_secs(1));
//! assert!(gate.try_acquire(&key).await);
//! # });
//! ```

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use storefront_core::environment::Clock;

pub mod kv_mocks;

pub use kv_mocks::{FailingKeyValueStore, InMemoryKeyValueStore};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Clock that only moves when a test advances it.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the store under test.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_testing::mocks::ManualClock;
    /// use storefront_core::environment::Clock;
    /// use std::time::Duration;
    ///
    /// let clock = storefront_testing::test_clock();
    /// let before = clock.now();
    /// clock.advance(Duration::from_millis(1500));
    /// assert_eq!((clock.now() - before).num_milliseconds(), 1500);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time = chrono::Duration::from_std(by)
                .ok()
                .and_then(|by| time.checked_add_signed(by))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a manual clock for tests, stopped at 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_clock() -> ManualClock {
        ManualClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_core=debug,storefront_web=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_2025() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_clones_share_time() {
        let clock = test_clock();
        let other = clock.clone();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), other.now());
    }
}
