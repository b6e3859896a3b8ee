//! Prometheus export of the traffic-shaping metrics.
//!
//! The core crate records through the `metrics` facade. This module installs
//! a Prometheus recorder for it and serves the rendered text on `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_web::metrics::install_prometheus;
//!
//! # fn example(state: storefront_web::AppState<storefront_testing::InMemoryKeyValueStore>)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install_prometheus()?;
//! let state = state.with_metrics(handle);
//! # Ok(())
//! # }
//! ```

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use storefront_core::metrics::describe_metrics;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the Prometheus recorder
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Metric descriptions are registered right after installation.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a global recorder is already
/// installed.
pub fn install_prometheus() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();
    tracing::info!("Prometheus recorder installed");

    Ok(handle)
}

/// Handler for `GET /metrics`.
///
/// Returns Prometheus text format, or `404 Not Found` when the state carries
/// no recorder handle.
#[allow(clippy::unused_async)]
pub async fn metrics_handler<K>(State(state): State<AppState<K>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use std::sync::Arc;
    use storefront_core::Config;
    use storefront_core::metrics::GATE_ACQUIRED;
    use storefront_testing::InMemoryKeyValueStore;

    fn state() -> AppState<InMemoryKeyValueStore> {
        AppState::new(Arc::new(InMemoryKeyValueStore::new()), Config::default())
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_404() {
        let response = metrics_handler(State(state())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_render() {
        // Local recorder: the global one may already be taken by another test
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            ::metrics::counter!(GATE_ACQUIRED).increment(2);
        });

        let response = metrics_handler(State(state().with_metrics(handle))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("idempotency_gate_acquired_total 2"));
    }
}
