//! Axum integration for the storefront traffic-shaping layer.
//!
//! This crate is the imperative shell around `storefront-core`: it turns the
//! idempotency gate into a tower layer, exposes pagination parameters as an
//! extractor, maps store and gate errors to HTTP responses, and serves the
//! operational endpoints.
//!
//! # Request Flow
//!
//! ```text
//! request ──► IdempotencyLayer ──► handler ──► CacheRepository ──► durable store
//!               │ (mutating only)       │            │ miss
//!               ▼                       ▼            ▼
//!          429 DUPLICATE_REQUEST   PageParams    read_through / paginate
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::{Router, routing::{get, post}};
//! use storefront_core::Config;
//! use storefront_redis::RedisKeyValueStore;
//! use storefront_web::{AppState, handlers, metrics, middleware::IdempotencyLayer};
//!
//! let config = Config::from_env();
//! config.validate()?;
//! let store = Arc::new(RedisKeyValueStore::from_config(&config.redis).await?);
//! let state = AppState::new(store, config).with_metrics(metrics::install_prometheus()?);
//!
//! let api = Router::new()
//!     .route("/api/orders", post(create_order))
//!     .route("/api/curations/:id/products", get(curation_products))
//!     .layer(IdempotencyLayer::from_state(&state));
//!
//! let app = api
//!     .merge(handlers::operational_routes())
//!     .with_state(state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ActorId, ClientIp, PageParams};
pub use middleware::{IdempotencyLayer, IdempotencyMiddleware};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
