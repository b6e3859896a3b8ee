//! Refresh-token storage.
//!
//! A member's current refresh token is kept in the shared store under
//! `member:{memberId}:token:refresh` as a raw string. Issuing and signing
//! tokens happens elsewhere; this store only remembers which token is
//! current so that rotation and logout can invalidate older ones.

use crate::cache::{CacheRepository, MemberRefreshTokenKey, RawStringCodec};
use crate::kv::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;

/// Default refresh-token lifetime (14 days).
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Current refresh token per member.
pub struct RefreshTokenStore<S> {
    entries: CacheRepository<S, MemberRefreshTokenKey, String, RawStringCodec>,
}

impl<S> Clone for RefreshTokenStore<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S: KeyValueStore> RefreshTokenStore<S> {
    /// Create a store whose tokens expire after `ttl`.
    #[must_use]
    pub const fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            entries: CacheRepository::member_tokens(store, ttl),
        }
    }

    /// Record `token` as the member's current refresh token, replacing any
    /// previous one.
    pub async fn save(&self, member_id: u64, token: &str) {
        self.entries
            .set(&MemberRefreshTokenKey(member_id), &token.to_string(), None)
            .await;
    }

    /// The member's current refresh token, if one is stored.
    pub async fn find(&self, member_id: u64) -> Option<String> {
        self.entries.get(&MemberRefreshTokenKey(member_id)).await
    }

    /// Whether `presented` is the member's current refresh token.
    ///
    /// The comparison does not short-circuit on the first differing byte.
    pub async fn matches(&self, member_id: u64, presented: &str) -> bool {
        self.find(member_id)
            .await
            .is_some_and(|current| {
                constant_time_eq::constant_time_eq(current.as_bytes(), presented.as_bytes())
            })
    }

    /// Forget the member's refresh token (logout).
    ///
    /// Returns `true` if a token was removed.
    pub async fn revoke(&self, member_id: u64) -> bool {
        self.entries.delete(&MemberRefreshTokenKey(member_id)).await
    }
}
