//! Shared key-value store abstraction.
//!
//! Every component in this crate coordinates through a single shared,
//! low-latency store. The store is an external dependency: this module only
//! defines the commands the components rely on.
//!
//! # Required commands
//!
//! | Method              | Redis equivalent            |
//! |---------------------|-----------------------------|
//! | `set_if_absent`     | `SET key value NX EX secs`  |
//! | `get`               | `GET key`                   |
//! | `set`               | `SET key value [EX secs]`   |
//! | `incr_by`/`decr_by` | `INCRBY` / `DECRBY`         |
//! | `delete`            | `DEL key`                   |
//! | `delete_by_prefix`  | `SCAN MATCH prefix*` + `DEL`|
//!
//! # Implementations
//!
//! - `RedisKeyValueStore` (in `storefront-redis`): production implementation
//! - `InMemoryKeyValueStore` (in `storefront-testing`): deterministic fake with
//!   a manual clock

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;

/// Result type for store commands.
pub type StoreResult<T> = Result<T, StoreError>;

/// A shared, mutable key-value store with atomic primitives.
///
/// # Atomicity
///
/// Implementations must guarantee that `set_if_absent` and `incr_by` are
/// atomic across every process sharing the store: of N concurrent
/// `set_if_absent` calls for the same key, exactly one succeeds while the
/// key lives, and N concurrent `incr_by(key, 1)` calls raise the value by N.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; handles are shared across request
/// tasks.
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key` only if the key does not exist.
    ///
    /// The entry expires after `ttl`.
    ///
    /// # Returns
    ///
    /// `true` if the value was written, `false` if the key already existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Unconditionally store `value` under `key`.
    ///
    /// With `Some(ttl)` the entry expires; with `None` it lives until deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Atomically add `delta` to the integer stored under `key`.
    ///
    /// A missing key counts as `0`.
    ///
    /// # Returns
    ///
    /// The value after the increment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Command`] if the stored value is not an integer,
    /// or another [`StoreError`] if the store is unreachable.
    fn incr_by(&self, key: &str, delta: i64) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Atomically subtract `delta` from the integer stored under `key`.
    ///
    /// # Errors
    ///
    /// Same as [`incr_by`](Self::incr_by).
    fn decr_by(&self, key: &str, delta: i64) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Delete `key`.
    ///
    /// # Returns
    ///
    /// `true` if the key existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Delete every key starting with `prefix`.
    ///
    /// Not atomic with respect to concurrent writers: keys written while the
    /// deletion runs may survive.
    ///
    /// # Returns
    ///
    /// Number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    fn delete_by_prefix(&self, prefix: &str) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store does not answer.
    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).set_if_absent(key, value, ttl)
    }

    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<String>>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).set(key, value, ttl)
    }

    fn incr_by(&self, key: &str, delta: i64) -> impl Future<Output = StoreResult<i64>> + Send {
        (**self).incr_by(key, delta)
    }

    fn decr_by(&self, key: &str, delta: i64) -> impl Future<Output = StoreResult<i64>> + Send {
        (**self).decr_by(key, delta)
    }

    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).delete(key)
    }

    fn delete_by_prefix(&self, prefix: &str) -> impl Future<Output = StoreResult<u64>> + Send {
        (**self).delete_by_prefix(prefix)
    }

    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).ping()
    }
}
