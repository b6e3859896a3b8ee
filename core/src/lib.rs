//! # Storefront Core
//!
//! Read/write traffic shaping for the storefront backend.
//!
//! The crate holds the parts of request handling that need care under
//! concurrency, independent of any web framework or database:
//!
//! - **Idempotency gate**: rejects duplicate in-flight (or rapidly repeated)
//!   mutating requests using an atomic set-if-absent in the shared store.
//! - **Cache-aside repository**: a generic read-through cache in front of the
//!   durable store, for catalog lookups and curation listings.
//! - **View counter**: best-effort atomic counters for product views.
//! - **Cursor pagination**: the pure keyset-pagination algorithm shared by
//!   every list endpoint.
//!
//! ## Failure policy
//!
//! The shared store is the only shared mutable resource. When it is
//! unreachable the idempotency gate fails **closed** (the request is
//! rejected) while the cache and the view counter fail **open** (the caller
//! falls back to the durable store, or the increment is dropped).
//!
//! ## Example
//!
//! ```ignore
//! use storefront_core::cache::{CacheRepository, ProductKey, read_through};
//! use storefront_core::pagination::paginate;
//!
//! let products = CacheRepository::products(store.clone(), config.cache.product_ttl());
//!
//! // Read path: cache first, durable store on miss.
//! let product = read_through(&products, &ProductKey(42), || db.find_product(42)).await?;
//!
//! // Listing path: the query fetched `size + 1` rows.
//! let page = paginate(rows, request.size(), |p: &Product| p.id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod keys;
pub mod kv;
pub mod metrics;
pub mod pagination;
pub mod tokens;
pub mod view_counter;

pub use cache::{CacheRepository, JsonCodec, RawStringCodec, read_through};
pub use config::Config;
pub use error::{CodecError, StoreError};
pub use idempotency::{GuardError, IdempotencyGate, IdempotencyKey};
pub use kv::KeyValueStore;
pub use pagination::{CursorPage, CursorRequest, paginate};
pub use tokens::RefreshTokenStore;
pub use view_counter::ViewCounter;

/// Environment module - injected dependencies for testability
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Stores that emulate expiry in-process (the in-memory fake used by
    /// tests) read time through this trait so TTL behaviour can be driven
    /// deterministically.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
