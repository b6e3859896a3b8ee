//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use storefront_core::KeyValueStore;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check the shared store.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    /// `ready` or `unavailable`.
    pub status: &'static str,
    /// Shared store probe result.
    pub store: String,
}

/// Health check with a shared store probe (for readiness).
///
/// The idempotency gate rejects every mutating request while the store is
/// down, so an instance that cannot reach it should leave the pool.
///
/// # Status Codes
///
/// - 200 OK: the store answered `PING`
/// - 503 Service Unavailable: the store did not answer
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "ready",
///   "store": "ok"
/// }
/// ```
pub async fn readiness<K>(State(state): State<AppState<K>>) -> (StatusCode, Json<Readiness>)
where
    K: KeyValueStore,
{
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                store: "ok".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable",
                    store: e.to_string(),
                }),
            )
        }
    }
}
