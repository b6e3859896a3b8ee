//! In-memory key-value stores for testing.
//!
//! [`InMemoryKeyValueStore`] emulates the subset of Redis semantics the
//! storefront components rely on (atomic set-if-absent, integer counters,
//! expiry) without a running server. Expiry is evaluated lazily against a
//! [`Clock`], so tests drive TTLs with a [`ManualClock`](crate::ManualClock)
//! instead of sleeping.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use storefront_core::StoreError;
use storefront_core::environment::{Clock, SystemClock};
use storefront_core::kv::{KeyValueStore, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory shared store with TTL emulation.
///
/// Every command runs under a single lock, so `set_if_absent` and `incr_by`
/// are atomic across tasks and threads. Clones share the same data.
///
/// # Example
///
/// ```
/// use storefront_testing::InMemoryKeyValueStore;
/// use storefront_core::KeyValueStore;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryKeyValueStore::new();
/// assert_eq!(store.incr_by("product:1:views", 1).await, Ok(1));
/// assert_eq!(store.incr_by("product:1:views", 1).await, Ok(2));
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store that reads wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty store whose expiry follows `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Write `value` under `key` without expiry, bypassing the trait.
    ///
    /// Useful to plant corrupt or legacy entries.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Whether `key` holds a live entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock().get(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Remaining lifetime of `key`.
    ///
    /// `None` if the key is missing or has no expiry.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(key).filter(|entry| entry.is_live(now))?;
        entry
            .expires_at
            .and_then(|at| (at - now).to_std().ok())
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().values().filter(|entry| entry.is_live(now)).count()
    }

    /// Whether the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn add(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let (current, expires_at) = match entries.get(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    StoreError::Command("ERR value is not an integer or out of range".to_string())
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::Command("ERR increment or decrement would overflow".to_string())
        })?;

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyValueStore")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut entries = self.lock();

        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        Ok(self
            .lock()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl.map(|ttl| self.expiry(ttl));
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.add(key, delta)
    }

    async fn decr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let delta = delta.checked_neg().ok_or_else(|| {
            StoreError::Command("ERR decrement would overflow".to_string())
        })?;
        self.add(key, delta)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        Ok(self
            .lock()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let now = self.clock.now();
        let mut removed = 0_u64;
        self.lock().retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if entry.is_live(now) {
                removed += 1;
            }
            false
        });
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Store whose every command fails as if the server were down.
///
/// Counts the commands it receives so tests can assert a component
/// consulted the store before falling back.
#[derive(Debug, Clone, Default)]
pub struct FailingKeyValueStore {
    calls: Arc<AtomicUsize>,
}

impl FailingKeyValueStore {
    /// Create a failing store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

impl KeyValueStore for FailingKeyValueStore {
    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<bool> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
        self.fail()
    }

    async fn incr_by(&self, _key: &str, _delta: i64) -> StoreResult<i64> {
        self.fail()
    }

    async fn decr_by(&self, _key: &str, _delta: i64) -> StoreResult<i64> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        self.fail()
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> StoreResult<u64> {
        self.fail()
    }

    async fn ping(&self) -> StoreResult<()> {
        self.fail()
    }
}
