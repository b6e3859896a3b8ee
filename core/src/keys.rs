//! Key naming scheme for the shared store.
//!
//! These shapes are shared with data already cached by earlier deployments
//! and must not change:
//!
//! ```text
//! request-lock:{actor}:{method}:{uri}
//! product:{id}
//! product:{id}:views
//! curation:{curationId}:product:cursor:{cursorIdOrNull}:size:{size}
//! member:{memberId}:token:refresh
//! ```

use std::fmt;

/// Namespace for idempotency lock records.
pub const REQUEST_LOCK: &str = "request-lock";

/// Namespace for product detail entries and product view counters.
pub const PRODUCT: &str = "product";

/// Namespace for curation listing pages.
pub const CURATION: &str = "curation";

/// Namespace for member-scoped entries (refresh tokens).
pub const MEMBER: &str = "member";

/// Join a namespace and an id into a store key.
///
/// # Examples
///
/// ```
/// use storefront_core::keys::{namespaced, PRODUCT};
///
/// assert_eq!(namespaced(PRODUCT, 42), "product:42");
/// ```
#[must_use]
pub fn namespaced(namespace: &str, id: impl fmt::Display) -> String {
    format!("{namespace}:{id}")
}

/// Key of the view counter for a product.
#[must_use]
pub fn product_views(product_id: u64) -> String {
    format!("{PRODUCT}:{product_id}:views")
}

/// Cache key of a single product detail: `product:{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductKey(pub u64);

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache key of one page of a curation's product listing.
///
/// Rendered below the `curation` namespace as
/// `{curationId}:product:cursor:{cursorIdOrNull}:size:{size}`, so that every
/// page of a curation shares the `curation:{curationId}:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurationPageKey {
    /// Curation the listing belongs to.
    pub curation_id: u64,
    /// Cursor the page starts at, `None` for the first page.
    pub cursor: Option<u64>,
    /// Requested page size.
    pub size: usize,
}

impl CurationPageKey {
    /// Prefix shared by every cached page of `curation_id`, relative to the
    /// `curation` namespace.
    #[must_use]
    pub fn curation_prefix(curation_id: u64) -> String {
        format!("{curation_id}:")
    }
}

impl fmt::Display for CurationPageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cursor {
            Some(cursor) => write!(
                f,
                "{}:product:cursor:{cursor}:size:{}",
                self.curation_id, self.size
            ),
            None => write!(
                f,
                "{}:product:cursor:null:size:{}",
                self.curation_id, self.size
            ),
        }
    }
}

/// Key of a member's refresh token, rendered as `{memberId}:token:refresh`
/// below the `member` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRefreshTokenKey(pub u64);

impl fmt::Display for MemberRefreshTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:token:refresh", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_key() {
        assert_eq!(namespaced(PRODUCT, ProductKey(7)), "product:7");
        assert_eq!(product_views(7), "product:7:views");
    }

    #[test]
    fn test_curation_page_key_first_page() {
        let key = CurationPageKey {
            curation_id: 3,
            cursor: None,
            size: 20,
        };
        assert_eq!(
            namespaced(CURATION, key),
            "curation:3:product:cursor:null:size:20"
        );
    }

    #[test]
    fn test_curation_page_key_shares_prefix() {
        let key = CurationPageKey {
            curation_id: 3,
            cursor: Some(118),
            size: 20,
        };
        let rendered = namespaced(CURATION, key);
        assert_eq!(rendered, "curation:3:product:cursor:118:size:20");
        assert!(rendered.starts_with(&namespaced(
            CURATION,
            CurationPageKey::curation_prefix(3)
        )));
        // A sibling curation whose id shares leading digits must not match.
        assert!(!namespaced(CURATION, CurationPageKey { curation_id: 31, ..key })
            .starts_with(&namespaced(CURATION, CurationPageKey::curation_prefix(3))));
    }

    #[test]
    fn test_member_refresh_token_key() {
        assert_eq!(
            namespaced(MEMBER, MemberRefreshTokenKey(99)),
            "member:99:token:refresh"
        );
    }
}
