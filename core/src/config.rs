//! Configuration for the traffic-shaping layer.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::cache::{DEFAULT_CURATION_TTL, DEFAULT_PRODUCT_TTL};
use crate::idempotency::DEFAULT_LOCK_TTL;
use crate::tokens::DEFAULT_REFRESH_TOKEN_TTL;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors from [`Config::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A TTL or timeout that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Page size bounds are inconsistent.
    #[error("Default page size {default} must be between 1 and max page size {max}")]
    PageSize {
        /// Configured default size.
        default: usize,
        /// Configured maximum size.
        max: usize,
    },
}

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Shared store connection.
    pub redis: RedisConfig,
    /// Idempotency gate.
    pub idempotency: IdempotencyConfig,
    /// Cache-aside lifetimes.
    pub cache: CacheConfig,
    /// Listing page sizes.
    pub pagination: PaginationConfig,
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Per-command timeout in milliseconds
    pub command_timeout_ms: u64,
}

/// Idempotency gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Lock lifetime in seconds (default: 1)
    pub lock_ttl_secs: u64,
    /// Largest request body buffered for fingerprinting, in bytes (default: 1 MiB)
    pub max_body_bytes: usize,
}

/// Cache lifetimes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Product detail TTL in seconds (default: 1 hour)
    pub product_ttl_secs: u64,
    /// Curation listing TTL in seconds (default: 1 hour)
    pub curation_ttl_secs: u64,
    /// Refresh token TTL in seconds (default: 14 days)
    pub refresh_token_ttl_secs: u64,
}

/// Listing page sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when the request names none (default: 10)
    pub default_size: usize,
    /// Largest page size a request may ask for (default: 100)
    pub max_size: usize,
}

impl RedisConfig {
    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-command timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl IdempotencyConfig {
    /// Lock lifetime.
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl CacheConfig {
    /// Product detail TTL.
    #[must_use]
    pub const fn product_ttl(&self) -> Duration {
        Duration::from_secs(self.product_ttl_secs)
    }

    /// Curation listing TTL.
    #[must_use]
    pub const fn curation_ttl(&self) -> Duration {
        Duration::from_secs(self.curation_ttl_secs)
    }

    /// Refresh token TTL.
    #[must_use]
    pub const fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                connect_timeout_ms: 2_000,
                command_timeout_ms: 500,
            },
            idempotency: IdempotencyConfig {
                lock_ttl_secs: DEFAULT_LOCK_TTL.as_secs(),
                max_body_bytes: 1024 * 1024,
            },
            cache: CacheConfig {
                product_ttl_secs: DEFAULT_PRODUCT_TTL.as_secs(),
                curation_ttl_secs: DEFAULT_CURATION_TTL.as_secs(),
                refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL.as_secs(),
            },
            pagination: PaginationConfig {
                default_size: 10,
                max_size: 100,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    ///
    /// | Variable                      | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `REDIS_URL`                   | `redis://127.0.0.1:6379` |
    /// | `REDIS_CONNECT_TIMEOUT_MS`    | `2000`                   |
    /// | `REDIS_COMMAND_TIMEOUT_MS`    | `500`                    |
    /// | `IDEMPOTENCY_LOCK_TTL_SECS`   | `1`                      |
    /// | `IDEMPOTENCY_MAX_BODY_BYTES`  | `1048576`                |
    /// | `CACHE_PRODUCT_TTL_SECS`      | `3600`                   |
    /// | `CACHE_CURATION_TTL_SECS`     | `3600`                   |
    /// | `REFRESH_TOKEN_TTL_SECS`      | `1209600`                |
    /// | `PAGINATION_DEFAULT_SIZE`     | `10`                     |
    /// | `PAGINATION_MAX_SIZE`         | `100`                    |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// [`from_env`](Self::from_env) uses the process environment; tests pass
    /// a map.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());
        let parsed_usize = |name: &str| lookup(name).and_then(|s| s.trim().parse::<usize>().ok());

        Self {
            redis: RedisConfig {
                url: lookup("REDIS_URL").unwrap_or(defaults.redis.url),
                connect_timeout_ms: parsed("REDIS_CONNECT_TIMEOUT_MS")
                    .unwrap_or(defaults.redis.connect_timeout_ms),
                command_timeout_ms: parsed("REDIS_COMMAND_TIMEOUT_MS")
                    .unwrap_or(defaults.redis.command_timeout_ms),
            },
            idempotency: IdempotencyConfig {
                lock_ttl_secs: parsed("IDEMPOTENCY_LOCK_TTL_SECS")
                    .unwrap_or(defaults.idempotency.lock_ttl_secs),
                max_body_bytes: parsed_usize("IDEMPOTENCY_MAX_BODY_BYTES")
                    .unwrap_or(defaults.idempotency.max_body_bytes),
            },
            cache: CacheConfig {
                product_ttl_secs: parsed("CACHE_PRODUCT_TTL_SECS")
                    .unwrap_or(defaults.cache.product_ttl_secs),
                curation_ttl_secs: parsed("CACHE_CURATION_TTL_SECS")
                    .unwrap_or(defaults.cache.curation_ttl_secs),
                refresh_token_ttl_secs: parsed("REFRESH_TOKEN_TTL_SECS")
                    .unwrap_or(defaults.cache.refresh_token_ttl_secs),
            },
            pagination: PaginationConfig {
                default_size: parsed_usize("PAGINATION_DEFAULT_SIZE")
                    .unwrap_or(defaults.pagination.default_size),
                max_size: parsed_usize("PAGINATION_MAX_SIZE")
                    .unwrap_or(defaults.pagination.max_size),
            },
        }
    }

    /// Check the loaded values for consistency.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroDuration`] if a TTL or timeout is zero
    /// - [`ConfigError::PageSize`] if the default page size is zero or above
    ///   the maximum
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.command_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("REDIS_COMMAND_TIMEOUT_MS"));
        }
        if self.idempotency.lock_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("IDEMPOTENCY_LOCK_TTL_SECS"));
        }
        if self.cache.product_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("CACHE_PRODUCT_TTL_SECS"));
        }
        if self.cache.curation_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("CACHE_CURATION_TTL_SECS"));
        }
        if self.cache.refresh_token_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("REFRESH_TOKEN_TTL_SECS"));
        }
        let default_size = self.pagination.default_size;
        let max_size = self.pagination.max_size;
        if default_size == 0 || default_size > max_size {
            return Err(ConfigError::PageSize {
                default: default_size,
                max: max_size,
            });
        }
        Ok(())
    }
}
