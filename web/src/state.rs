//! Application state for Axum handlers.
//!
//! [`AppState`] bundles the shared-store components every storefront
//! handler needs. It is generic over the [`KeyValueStore`] so that the same
//! router runs against Redis in production and the in-memory store in tests.

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use storefront_core::config::PaginationConfig;
use storefront_core::{Config, IdempotencyGate, KeyValueStore, ViewCounter};

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap: every component shares the same store handle.
///
/// # Examples
///
/// ```ignore
/// use axum::{extract::{Path, State}, Json};
/// use storefront_web::{AppError, AppState};
///
/// async fn product(
///     State(state): State<AppState<RedisKeyValueStore>>,
///     Path(id): Path<u64>,
/// ) -> Result<Json<ProductDetail>, AppError> {
///     state.views.increment(id, 1).await;
///     // ...
/// }
/// ```
pub struct AppState<K> {
    /// Shared key-value store.
    pub store: Arc<K>,
    /// Duplicate-request gate.
    pub gate: IdempotencyGate<K>,
    /// Product view counter.
    pub views: ViewCounter<K>,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Prometheus handle, when a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl<K> Clone for AppState<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: self.gate.clone(),
            views: self.views.clone(),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
        }
    }
}

impl<K: KeyValueStore> AppState<K> {
    /// Build the state from a connected store and configuration.
    #[must_use]
    pub fn new(store: Arc<K>, config: Config) -> Self {
        let gate = IdempotencyGate::new(Arc::clone(&store), config.idempotency.lock_ttl());
        let views = ViewCounter::new(Arc::clone(&store));
        Self {
            store,
            gate,
            views,
            config: Arc::new(config),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for the `/metrics` endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl<K> FromRef<AppState<K>> for PaginationConfig {
    fn from_ref(state: &AppState<K>) -> Self {
        state.config.pagination.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_testing::InMemoryKeyValueStore;

    #[test]
    fn test_state_is_clone() {
        // Ensure AppState implements Clone (required for Axum)
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState<InMemoryKeyValueStore>>();
    }

    #[test]
    fn test_gate_uses_configured_ttl() {
        let mut config = Config::default();
        config.idempotency.lock_ttl_secs = 3;

        let state = AppState::new(Arc::new(InMemoryKeyValueStore::new()), config);

        assert_eq!(state.gate.ttl(), std::time::Duration::from_secs(3));
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_pagination_config_from_state() {
        let state = AppState::new(Arc::new(InMemoryKeyValueStore::new()), Config::default());

        let limits = PaginationConfig::from_ref(&state);
        assert_eq!(limits.default_size, 10);
        assert_eq!(limits.max_size, 100);
    }
}
