//! Axum middleware rejecting duplicate mutating requests.
//!
//! [`IdempotencyLayer`] runs every `POST`, `PUT`, `PATCH` and `DELETE`
//! through the [`IdempotencyGate`] before the handler sees it. Safe methods
//! pass through untouched.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::post};
//! use storefront_web::middleware::IdempotencyLayer;
//!
//! let app = Router::new()
//!     .route("/api/orders", post(create_order))
//!     .layer(IdempotencyLayer::from_state(&state))
//!     .with_state(state);
//! ```
//!
//! # Flow
//!
//! 1. **Identify** the actor: `ActorId` extension, `X-Actor-Id` header,
//!    client IP, or `anonymous`
//! 2. **Buffer** the body (up to the configured limit) and fingerprint it
//! 3. **Acquire** `request-lock:{actor}:{METHOD}:{path}[#{sha256}]`
//! 4. **Reject** with `429 DUPLICATE_REQUEST` if the lock is held or the
//!    store is unreachable, otherwise **forward** the untouched request
//!
//! The lock is never released by the middleware; it expires with its TTL.

use crate::error::{AppError, DUPLICATE_MESSAGE};
use crate::extractors::{client_ip, ActorId};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_LENGTH, request::Parts, Method},
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use storefront_core::{IdempotencyGate, IdempotencyKey, KeyValueStore};
use tower::{Layer, Service};
use tracing::Instrument;

/// Actor used when a request carries no identity at all.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Whether `method` can change server state.
#[must_use]
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Actor of a request for lock-key purposes.
fn actor_of(parts: &Parts) -> String {
    ActorId::from_parts(parts)
        .map(|ActorId(actor)| actor)
        .or_else(|| client_ip(parts).map(|ip| ip.to_string()))
        .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string())
}

/// Layer guarding mutating requests with an [`IdempotencyGate`].
pub struct IdempotencyLayer<K> {
    gate: IdempotencyGate<K>,
    max_body_bytes: usize,
}

impl<K> Clone for IdempotencyLayer<K> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<K: KeyValueStore> IdempotencyLayer<K> {
    /// Guard requests with `gate`, buffering at most `max_body_bytes` of
    /// each body for the fingerprint.
    #[must_use]
    pub const fn new(gate: IdempotencyGate<K>, max_body_bytes: usize) -> Self {
        Self {
            gate,
            max_body_bytes,
        }
    }

    /// Layer using the state's gate and configured body limit.
    #[must_use]
    pub fn from_state(state: &AppState<K>) -> Self {
        Self::new(state.gate.clone(), state.config.idempotency.max_body_bytes)
    }
}

impl<K, S> Layer<S> for IdempotencyLayer<K> {
    type Service = IdempotencyMiddleware<K, S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyMiddleware {
            inner,
            gate: self.gate.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Middleware service produced by [`IdempotencyLayer`].
pub struct IdempotencyMiddleware<K, S> {
    inner: S,
    gate: IdempotencyGate<K>,
    max_body_bytes: usize,
}

impl<K, S: Clone> Clone for IdempotencyMiddleware<K, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<K, S> Service<Request> for IdempotencyMiddleware<K, S>
where
    K: KeyValueStore + 'static,
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if !is_mutating(req.method()) {
            return Box::pin(self.inner.call(req));
        }

        // Take the service that was polled ready, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();
        let max_body_bytes = self.max_body_bytes;

        let span = tracing::debug_span!(
            "idempotency",
            method = %req.method(),
            path = %req.uri().path(),
        );

        Box::pin(
            async move {
                let (parts, body) = req.into_parts();

                let declared = parts
                    .headers
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<usize>().ok());
                if declared.is_some_and(|len| len > max_body_bytes) {
                    return Ok(AppError::payload_too_large(max_body_bytes).into_response());
                }

                let Ok(bytes) = axum::body::to_bytes(body, max_body_bytes).await else {
                    return Ok(AppError::payload_too_large(max_body_bytes).into_response());
                };

                let key = IdempotencyKey::new(actor_of(&parts), parts.method.as_str(), parts.uri.path())
                    .with_body(&bytes);

                if !gate.try_acquire(&key).await {
                    return Ok(AppError::too_many_requests(DUPLICATE_MESSAGE).into_response());
                }

                inner
                    .call(Request::from_parts(parts, Body::from(bytes)))
                    .await
            }
            .instrument(span),
        )
    }
}
