//! # Storefront Redis
//!
//! Redis implementation of [`KeyValueStore`].
//!
//! # Commands
//!
//! | Operation          | Redis                                   |
//! |--------------------|-----------------------------------------|
//! | `set_if_absent`    | `SET key value NX PX ms`                |
//! | `get`              | `GET key`                               |
//! | `set`              | `SET key value` / `PSETEX key ms value` |
//! | `incr_by`          | `INCRBY key delta`                      |
//! | `decr_by`          | `DECRBY key delta`                      |
//! | `delete`           | `DEL key`                               |
//! | `delete_by_prefix` | `SCAN 0 MATCH prefix* COUNT n` + `DEL`  |
//! | `ping`             | `PING`                                  |
//!
//! `SET NX` and `INCRBY` are single commands, so the atomicity the gate and
//! the view counter rely on comes from Redis itself.
//!
//! # Timeouts
//!
//! Every command is bounded by the configured command timeout. A command
//! that does not answer in time fails with [`StoreError::Timeout`] instead
//! of stalling the request.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_core::{Config, IdempotencyGate};
//! use storefront_redis::RedisKeyValueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let store = Arc::new(RedisKeyValueStore::from_config(&config.redis).await?);
//! let gate = IdempotencyGate::new(store, config.idempotency.lock_ttl());
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::future::Future;
use std::time::Duration;
use storefront_core::StoreError;
use storefront_core::config::RedisConfig;
use storefront_core::kv::{KeyValueStore, StoreResult};

/// Keys fetched per `SCAN` round trip during prefix deletion.
const SCAN_BATCH: usize = 500;

/// `Redis`-backed shared store.
///
/// # Thread Safety
///
/// This type is `Clone` and can be shared across tasks. Each clone shares
/// the same `ConnectionManager`, which reconnects on its own after the
/// server drops the connection.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    /// Connection manager for connection reuse.
    conn_manager: ConnectionManager,
    /// Upper bound for a single command.
    command_timeout: Duration,
}

impl RedisKeyValueStore {
    /// Connect with default timeouts.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is malformed or the
    /// server cannot be reached.
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let defaults = storefront_core::Config::default().redis;
        Self::connect(
            redis_url,
            defaults.connect_timeout(),
            defaults.command_timeout(),
        )
        .await
    }

    /// Connect using the `redis` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is malformed or the
    /// server cannot be reached, [`StoreError::Timeout`] if connecting takes
    /// longer than the connect timeout.
    pub async fn from_config(config: &RedisConfig) -> StoreResult<Self> {
        Self::connect(
            &config.url,
            config.connect_timeout(),
            config.command_timeout(),
        )
        .await
    }

    async fn connect(
        redis_url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(|e| {
                StoreError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
            })?;

        tracing::info!(
            command_timeout = ?command_timeout,
            "RedisKeyValueStore initialized successfully"
        );

        Ok(Self {
            conn_manager,
            command_timeout,
        })
    }

    /// Run one command under the command timeout.
    async fn bounded<T>(
        &self,
        command: &'static str,
        fut: impl Future<Output = Result<T, RedisError>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, command, "Redis command failed");
                Err(map_redis_error(&e))
            }
            Err(_) => {
                tracing::debug!(command, timeout = ?self.command_timeout, "Redis command timed out");
                Err(StoreError::Timeout(self.command_timeout))
            }
        }
    }
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// Classify a driver error.
fn map_redis_error(e: &RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

/// Millisecond TTL for `PX`/`PSETEX`, at least 1.
#[allow(clippy::cast_possible_truncation)] // TTLs are far below u64::MAX ms
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

/// `SCAN MATCH` pattern matching every key starting with `prefix`.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

impl KeyValueStore for RedisKeyValueStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn_manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX").arg("PX").arg(ttl_millis(ttl));

        // Nil when the key already exists
        let reply: Option<String> = self
            .bounded("SET NX", cmd.query_async(&mut conn))
            .await?;

        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn_manager.clone();
        self.bounded("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn_manager.clone();
        match ttl {
            Some(ttl) => {
                self.bounded("PSETEX", conn.pset_ex(key, value, ttl_millis(ttl)))
                    .await
            }
            None => self.bounded("SET", conn.set(key, value)).await,
        }
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn_manager.clone();
        self.bounded("INCRBY", conn.incr(key, delta)).await
    }

    async fn decr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn_manager.clone();
        self.bounded("DECRBY", conn.decr(key, delta)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn_manager.clone();
        let deleted: u64 = self.bounded("DEL", conn.del(key)).await?;
        Ok(deleted > 0)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let mut conn = self.conn_manager.clone();
        let pattern = prefix_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);

            let (next, keys): (u64, Vec<String>) =
                self.bounded("SCAN", scan.query_async(&mut conn)).await?;

            if !keys.is_empty() {
                let deleted: u64 = self.bounded("DEL", conn.del(&keys)).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(prefix = %prefix, removed, "Deleted keys by prefix");
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}
