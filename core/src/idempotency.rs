//! Idempotency gate for mutating requests.
//!
//! Guards against duplicate in-flight (or rapidly repeated) side-effecting
//! requests from the same actor.
//!
//! # Algorithm
//!
//! 1. Derive an [`IdempotencyKey`] from the request: actor, HTTP method,
//!    normalized resource path and, when a body is present, a SHA-256
//!    fingerprint of the body.
//! 2. `SET request-lock:{actor}:{method}:{uri}[#{fingerprint}] 1 NX EX ttl`
//! 3. Written → the request proceeds. Not written → duplicate, reject.
//!
//! The lock record is never deleted: expiry is the only release, so a
//! completed request still blocks identical requests until the TTL runs out.
//! There is no ownership, renewal or reentrancy; two calls with the same key
//! shape are duplicates whoever makes them.
//!
//! # Failure policy
//!
//! If the shared store cannot be reached the gate fails **closed**: the
//! request is treated as a duplicate. Letting it through would defeat the
//! deduplication guarantee.

use crate::keys::REQUEST_LOCK;
use crate::kv::KeyValueStore;
use crate::metrics::{GATE_ACQUIRED, GATE_REJECTED, GATE_STORE_ERRORS};
use ::metrics::counter;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Value written under a lock key. Only the key's existence matters.
pub const LOCK_SENTINEL: &str = "1";

/// Default lock lifetime.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(1);

/// Deterministic identity of a mutating request.
///
/// # Example
///
/// ```
/// use storefront_core::IdempotencyKey;
///
/// let key = IdempotencyKey::new("member-7", "post", "/api/orders/?page=2");
/// assert_eq!(key.store_key(), "request-lock:member-7:POST:/api/orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    actor: String,
    method: String,
    resource_path: String,
    fingerprint: Option<String>,
}

impl IdempotencyKey {
    /// Build a key from the request line.
    ///
    /// The method is upper-cased; the path loses its query string and any
    /// trailing `/` (the root path stays `/`).
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        method: impl AsRef<str>,
        resource_path: impl AsRef<str>,
    ) -> Self {
        Self {
            actor: actor.into(),
            method: method.as_ref().to_ascii_uppercase(),
            resource_path: normalize_path(resource_path.as_ref()),
            fingerprint: None,
        }
    }

    /// Salt the key with a fingerprint of the request body.
    ///
    /// An empty body adds nothing, so body-less requests keep the plain
    /// `request-lock:{actor}:{method}:{uri}` shape.
    #[must_use]
    pub fn with_body(mut self, body: &[u8]) -> Self {
        if !body.is_empty() {
            self.fingerprint = Some(fingerprint(body));
        }
        self
    }

    /// Salt the key with a caller-computed fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Acting principal.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Upper-cased HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Normalized resource path.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Body fingerprint, if any.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Key of the lock record in the shared store.
    #[must_use]
    pub fn store_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{REQUEST_LOCK}:{}:{}:{}",
            self.actor, self.method, self.resource_path
        )?;
        // `#` never survives path normalization.
        if let Some(fingerprint) = &self.fingerprint {
            write!(f, "#{fingerprint}")?;
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a request body.
#[must_use]
pub fn fingerprint(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Error returned by [`IdempotencyGate::guard`].
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// An identical request is in flight or completed within the lock TTL.
    #[error("Duplicate request: {key}")]
    Duplicate {
        /// Store key of the lock that was already held.
        key: String,
    },

    /// The guarded operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> GuardError<E> {
    /// Returns `true` for [`GuardError::Duplicate`].
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Distributed duplicate-request gate backed by the shared store.
///
/// Cloning is cheap; clones share the store handle.
pub struct IdempotencyGate<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S> Clone for IdempotencyGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
        }
    }
}

impl<S: KeyValueStore> IdempotencyGate<S> {
    /// Create a gate whose locks live for `ttl`.
    #[must_use]
    pub const fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Lock lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock for `key`.
    ///
    /// # Returns
    ///
    /// `true` if no lock existed and one was created. `false` if the request
    /// is a duplicate, or if the store failed (fail closed).
    pub async fn try_acquire(&self, key: &IdempotencyKey) -> bool {
        let store_key = key.store_key();

        match self
            .store
            .set_if_absent(&store_key, LOCK_SENTINEL, self.ttl)
            .await
        {
            Ok(true) => {
                counter!(GATE_ACQUIRED).increment(1);
                tracing::debug!(
                    key = %store_key,
                    ttl = ?self.ttl,
                    "Idempotency lock acquired"
                );
                true
            }
            Ok(false) => {
                counter!(GATE_REJECTED).increment(1);
                tracing::warn!(
                    key = %store_key,
                    actor = %key.actor(),
                    "Duplicate request rejected"
                );
                false
            }
            Err(e) => {
                counter!(GATE_STORE_ERRORS).increment(1);
                counter!(GATE_REJECTED).increment(1);
                tracing::error!(
                    error = %e,
                    key = %store_key,
                    "Shared store failed during idempotency check (safe default: reject)"
                );
                false
            }
        }
    }

    /// Run `op` only if the lock for `key` can be taken.
    ///
    /// This is the decorator form of the gate: the key and the operation are
    /// supplied by the caller, the gate decides whether the operation runs.
    /// A rejected call is never retried or queued.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Duplicate`] if the gate rejected the key; `op` was not
    ///   called.
    /// - [`GuardError::Operation`] if `op` ran and failed.
    pub async fn guard<T, E, F, Fut>(&self, key: &IdempotencyKey, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire(key).await {
            return Err(GuardError::Duplicate {
                key: key.store_key(),
            });
        }

        op().await.map_err(GuardError::Operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_without_body_keeps_plain_shape() {
        let key = IdempotencyKey::new("42", "delete", "/api/orders/9").with_body(b"");
        assert_eq!(key.store_key(), "request-lock:42:DELETE:/api/orders/9");
        assert_eq!(key.fingerprint(), None);
    }

    #[test]
    fn test_key_with_body_appends_fingerprint() {
        let key = IdempotencyKey::new("42", "POST", "/api/orders").with_body(b"{\"qty\":1}");
        let expected = format!("request-lock:42:POST:/api/orders#{}", fingerprint(b"{\"qty\":1}"));
        assert_eq!(key.store_key(), expected);
    }

    #[test]
    fn test_different_bodies_produce_different_keys() {
        let a = IdempotencyKey::new("42", "POST", "/api/orders").with_body(b"{\"qty\":1}");
        let b = IdempotencyKey::new("42", "POST", "/api/orders").with_body(b"{\"qty\":2}");
        assert_ne!(a, b);
    }

    #[test]
    fn test_path_cannot_impersonate_fingerprint() {
        let digest = fingerprint(b"{\"qty\":1}");
        let with_body = IdempotencyKey::new("7", "POST", "/api/orders").with_body(b"{\"qty\":1}");
        let colon_path = IdempotencyKey::new("7", "POST", format!("/api/orders:{digest}"));
        let hash_path = IdempotencyKey::new("7", "POST", format!("/api/orders#{digest}"));

        assert_ne!(with_body.store_key(), colon_path.store_key());
        assert_ne!(with_body.store_key(), hash_path.store_key());
        assert_eq!(hash_path.store_key(), "request-lock:7:POST:/api/orders");
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("/api/orders/"), "/api/orders");
        assert_eq!(normalize_path("/api/orders?x=1"), "/api/orders");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_guard_error_display() {
        let err: GuardError<std::io::Error> = GuardError::Duplicate {
            key: "request-lock:1:POST:/x".to_string(),
        };
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), "Duplicate request: request-lock:1:POST:/x");
    }
}
