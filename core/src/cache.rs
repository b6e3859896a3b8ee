//! Cache-aside repository.
//!
//! One generic repository replaces a hand-written cache wrapper per entity
//! kind. Each repository is parameterized by:
//!
//! - a **namespace** (`product`, `curation`, `member`, ...),
//! - a **key type** rendered below that namespace (`K: Display`),
//! - a **value type** and the **codec** that turns it into a string.
//!
//! # Cache-aside
//!
//! The repository never touches the durable store. On a miss the caller
//! loads the value itself and calls [`CacheRepository::set`];
//! [`read_through`] packages that sequence for the common case.
//!
//! # Failure policy
//!
//! The cache is advisory and fails **open**:
//!
//! - store unreachable on read → miss
//! - stored bytes undecodable (corrupt entry, older schema) → miss
//! - value unencodable or store unreachable on write → write skipped
//!
//! All of these are logged at `warn` and none reach the caller.

use crate::error::CodecError;
use crate::keys::{self, CURATION, MEMBER, PRODUCT};
use crate::kv::KeyValueStore;
use crate::metrics::{CACHE_DECODE_ERRORS, CACHE_HITS, CACHE_MISSES, CACHE_WRITE_ERRORS};
use ::metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub use crate::keys::{CurationPageKey, MemberRefreshTokenKey, ProductKey};

/// Default lifetime of a product detail entry.
pub const DEFAULT_PRODUCT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of a cached curation listing page.
pub const DEFAULT_CURATION_TTL: Duration = Duration::from_secs(60 * 60);

/// Converts values to and from their cached string form.
pub trait CacheCodec<V> {
    /// Encode a value for storage.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialize`] if the value cannot be encoded.
    fn encode(value: &V) -> Result<String, CodecError>;

    /// Decode a stored value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Deserialize`] if `raw` is not a valid encoding.
    fn decode(raw: &str) -> Result<V, CodecError>;
}

/// UTF-8 JSON, the format of every cached domain object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V: Serialize + DeserializeOwned> CacheCodec<V> for JsonCodec {
    fn encode(value: &V) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode(raw: &str) -> Result<V, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// Stores strings as-is, without JSON quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawStringCodec;

impl CacheCodec<String> for RawStringCodec {
    fn encode(value: &String) -> Result<String, CodecError> {
        Ok(value.clone())
    }

    fn decode(raw: &str) -> Result<String, CodecError> {
        Ok(raw.to_string())
    }
}

/// Generic read-through cache for one entity kind.
///
/// Keys are `{namespace}:{key}`. Cloning is cheap; clones share the store.
///
/// # Example
///
/// ```ignore
/// use storefront_core::cache::{CacheRepository, ProductKey};
///
/// let products: CacheRepository<_, ProductKey, ProductDetail> =
///     CacheRepository::products(store, Duration::from_secs(3600));
///
/// if let Some(detail) = products.get(&ProductKey(42)).await {
///     return Ok(detail);
/// }
/// let detail = db.load_product(42).await?;
/// products.set(&ProductKey(42), &detail, None).await;
/// ```
pub struct CacheRepository<S, K, V, C = JsonCodec> {
    store: Arc<S>,
    namespace: &'static str,
    default_ttl: Duration,
    _marker: PhantomData<fn(&K, V, C)>,
}

impl<S, K, V, C> Clone for CacheRepository<S, K, V, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace,
            default_ttl: self.default_ttl,
            _marker: PhantomData,
        }
    }
}

impl<S, K, V, C> CacheRepository<S, K, V, C>
where
    S: KeyValueStore,
    K: Display,
    C: CacheCodec<V>,
{
    /// Create a repository for `namespace` whose entries live for
    /// `default_ttl` unless a write says otherwise.
    #[must_use]
    pub const fn new(store: Arc<S>, namespace: &'static str, default_ttl: Duration) -> Self {
        Self {
            store,
            namespace,
            default_ttl,
            _marker: PhantomData,
        }
    }

    /// Namespace this repository writes under.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Lifetime applied when [`set`](Self::set) gets no explicit TTL.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Full store key for `key`.
    #[must_use]
    pub fn key_for(&self, key: &K) -> String {
        keys::namespaced(self.namespace, key)
    }

    /// Look up a cached value.
    ///
    /// Returns `None` on a miss, on store failure, or when the stored entry
    /// cannot be decoded. Never fails.
    pub async fn get(&self, key: &K) -> Option<V> {
        let store_key = self.key_for(key);

        let raw = match self.store.get(&store_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!(CACHE_MISSES, "namespace" => self.namespace).increment(1);
                tracing::debug!(key = %store_key, "Cache miss");
                return None;
            }
            Err(e) => {
                counter!(CACHE_MISSES, "namespace" => self.namespace).increment(1);
                tracing::warn!(
                    error = %e,
                    key = %store_key,
                    "Cache read failed, treating as miss"
                );
                return None;
            }
        };

        match C::decode(&raw) {
            Ok(value) => {
                counter!(CACHE_HITS, "namespace" => self.namespace).increment(1);
                tracing::debug!(key = %store_key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                counter!(CACHE_DECODE_ERRORS, "namespace" => self.namespace).increment(1);
                counter!(CACHE_MISSES, "namespace" => self.namespace).increment(1);
                tracing::warn!(
                    error = %e,
                    key = %store_key,
                    "Discarding undecodable cache entry"
                );
                None
            }
        }
    }

    /// Populate the cache.
    ///
    /// `ttl` overrides the repository default. Encoding and store failures
    /// are logged and swallowed: the next reader misses and repopulates.
    pub async fn set(&self, key: &K, value: &V, ttl: Option<Duration>) {
        let store_key = self.key_for(key);

        let encoded = match C::encode(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                counter!(CACHE_WRITE_ERRORS, "namespace" => self.namespace).increment(1);
                tracing::warn!(
                    error = %e,
                    key = %store_key,
                    "Skipping cache write, value not serializable"
                );
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.store.set(&store_key, &encoded, Some(ttl)).await {
            counter!(CACHE_WRITE_ERRORS, "namespace" => self.namespace).increment(1);
            tracing::warn!(
                error = %e,
                key = %store_key,
                "Cache write failed"
            );
            return;
        }

        tracing::debug!(key = %store_key, ttl = ?ttl, "Cache populated");
    }

    /// Drop a single entry.
    ///
    /// Returns `true` if an entry was removed. Store failures count as
    /// "nothing removed".
    pub async fn delete(&self, key: &K) -> bool {
        let store_key = self.key_for(key);
        match self.store.delete(&store_key).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, key = %store_key, "Cache delete failed");
                false
            }
        }
    }

    /// Bulk-delete every entry whose key starts with
    /// `{namespace}:{prefix}`.
    ///
    /// Used when a whole collection is rebuilt (e.g. a curation is
    /// re-curated). Coarse-grained: readers may observe stale pages until
    /// this runs. Returns the number of removed entries, `0` on failure.
    pub async fn invalidate_prefix(&self, prefix: impl Display) -> u64 {
        let store_prefix = keys::namespaced(self.namespace, prefix);
        match self.store.delete_by_prefix(&store_prefix).await {
            Ok(removed) => {
                tracing::info!(prefix = %store_prefix, removed, "Cache entries invalidated");
                removed
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    prefix = %store_prefix,
                    "Cache invalidation failed, entries expire by TTL"
                );
                0
            }
        }
    }
}

impl<S, V> CacheRepository<S, ProductKey, V, JsonCodec>
where
    S: KeyValueStore,
    V: Serialize + DeserializeOwned,
{
    /// Product detail cache: `product:{id}`.
    #[must_use]
    pub const fn products(store: Arc<S>, ttl: Duration) -> Self {
        Self::new(store, PRODUCT, ttl)
    }
}

impl<S, V> CacheRepository<S, CurationPageKey, V, JsonCodec>
where
    S: KeyValueStore,
    V: Serialize + DeserializeOwned,
{
    /// Curation listing cache:
    /// `curation:{curationId}:product:cursor:{cursorIdOrNull}:size:{size}`.
    #[must_use]
    pub const fn curation_pages(store: Arc<S>, ttl: Duration) -> Self {
        Self::new(store, CURATION, ttl)
    }

    /// Drop every cached page of one curation.
    pub async fn invalidate_curation(&self, curation_id: u64) -> u64 {
        self.invalidate_prefix(CurationPageKey::curation_prefix(curation_id))
            .await
    }
}

impl<S> CacheRepository<S, MemberRefreshTokenKey, String, RawStringCodec>
where
    S: KeyValueStore,
{
    /// Member refresh-token entries: `member:{memberId}:token:refresh`,
    /// stored as raw strings.
    #[must_use]
    pub const fn member_tokens(store: Arc<S>, ttl: Duration) -> Self {
        Self::new(store, MEMBER, ttl)
    }
}

/// Cache-aside read: return the cached value, or load it, cache it and
/// return it.
///
/// The loader runs only on a miss. A loader error is returned unchanged and
/// nothing is cached; `Ok(None)` (entity does not exist) is not cached
/// either.
///
/// # Errors
///
/// Returns the loader's error.
///
/// # Example
///
/// ```ignore
/// let detail = read_through(&products, &ProductKey(id), || async {
///     repo.find_product_detail(id).await
/// })
/// .await?;
/// ```
pub async fn read_through<S, K, V, C, F, Fut, E>(
    cache: &CacheRepository<S, K, V, C>,
    key: &K,
    load: F,
) -> Result<Option<V>, E>
where
    S: KeyValueStore,
    K: Display,
    C: CacheCodec<V>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<V>, E>>,
{
    if let Some(hit) = cache.get(key).await {
        return Ok(Some(hit));
    }

    let loaded = load().await?;
    if let Some(value) = &loaded {
        cache.set(key, value, None).await;
    }
    Ok(loaded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Detail {
        id: u64,
        name: String,
    }

    #[test]
    fn test_json_codec_round_trip() {
        let detail = Detail {
            id: 1,
            name: "Linen shirt".to_string(),
        };
        let encoded = <JsonCodec as CacheCodec<Detail>>::encode(&detail).unwrap();
        assert_eq!(encoded, r#"{"id":1,"name":"Linen shirt"}"#);
        let decoded: Detail = <JsonCodec as CacheCodec<Detail>>::decode(&encoded).unwrap();
        assert_eq!(decoded, detail);
    }

    #[test]
    fn test_json_codec_rejects_truncated_entry() {
        let result = <JsonCodec as CacheCodec<Detail>>::decode(r#"{"id":1,"na"#);
        assert!(matches!(result, Err(CodecError::Deserialize(_))));
    }

    #[test]
    fn test_raw_string_codec_is_unquoted() {
        let encoded = RawStringCodec::encode(&"token-abc".to_string()).unwrap();
        assert_eq!(encoded, "token-abc");
    }
}
