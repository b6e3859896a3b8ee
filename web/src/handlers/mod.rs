//! HTTP request handlers.
//!
//! Operational endpoints shared by every storefront service.

pub mod health;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::{routing::get, Router};
use storefront_core::KeyValueStore;

// Re-export common handler utilities
pub use health::{health_check, readiness};

/// Routes for `/health`, `/health/ready` and `/metrics`.
///
/// Merge into the application router before `with_state`. These routes
/// should sit outside the [`IdempotencyLayer`](crate::middleware::IdempotencyLayer);
/// they only accept `GET` so the layer would pass them through anyway.
pub fn operational_routes<K>() -> Router<AppState<K>>
where
    K: KeyValueStore + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness::<K>))
        .route("/metrics", get(metrics_handler::<K>))
}
