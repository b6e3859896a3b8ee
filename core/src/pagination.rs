//! Keyset ("cursor") pagination.
//!
//! Every list endpoint pages with a stable, monotonic sort key (descending
//! primary id) instead of an offset. The query layer fetches **one row more**
//! than requested, starting at the caller's cursor; [`paginate`] then trims
//! the extra row and turns it into the continuation cursor.
//!
//! ```text
//! ids in store:   5 4 3 2 1
//! size = 3, no cursor → query LIMIT 4 → [5, 4, 3, 2]
//! page            → content [5, 4, 3], has_next, next_cursor_id = 2
//! ```
//!
//! Note that `next_cursor_id` is the id of the first row *not* returned,
//! not the id of the last row returned. The follow-up query therefore
//! resumes **at** the cursor (`id <= cursor` for a descending listing).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T, Id = u64> {
    /// Rows of this page, at most `size` of them, in query order.
    pub content: Vec<T>,
    /// Requested page size.
    pub size: usize,
    /// Whether the query found at least one more row.
    pub has_next: bool,
    /// Id of the first row past this page; `Some` iff `has_next`.
    pub next_cursor_id: Option<Id>,
}

impl<T, Id> CursorPage<T, Id> {
    /// A page with no rows and no continuation.
    #[must_use]
    pub const fn empty(size: usize) -> Self {
        Self {
            content: Vec::new(),
            size,
            has_next: false,
            next_cursor_id: None,
        }
    }

    /// Convert every row, keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U, Id> {
        CursorPage {
            content: self.content.into_iter().map(f).collect(),
            size: self.size,
            has_next: self.has_next,
            next_cursor_id: self.next_cursor_id,
        }
    }

    /// Number of rows in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether this page has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Build a page from an over-fetched, ordered result set.
///
/// `rows` must hold at most `requested_size + 1` rows in the listing's sort
/// order, starting at the request cursor. When more than
/// `requested_size` rows are present, the row at index `requested_size` is
/// dropped and its id becomes `next_cursor_id`. Otherwise the rows are
/// returned untouched with no continuation.
///
/// A result set of exactly `requested_size` rows yields `has_next == false`:
/// without the over-fetched row there is no way to tell a full last page
/// from a page with more behind it.
///
/// # Examples
///
/// ```
/// use storefront_core::pagination::paginate;
///
/// let page = paginate(vec![5_u64, 4, 3, 2], 3, |id| *id);
/// assert_eq!(page.content, vec![5, 4, 3]);
/// assert!(page.has_next);
/// assert_eq!(page.next_cursor_id, Some(2));
/// ```
#[must_use]
pub fn paginate<T, Id>(
    mut rows: Vec<T>,
    requested_size: usize,
    id_of: impl Fn(&T) -> Id,
) -> CursorPage<T, Id> {
    if rows.len() > requested_size {
        let next_cursor_id = Some(id_of(&rows[requested_size]));
        rows.truncate(requested_size);
        CursorPage {
            content: rows,
            size: requested_size,
            has_next: true,
            next_cursor_id,
        }
    } else {
        CursorPage {
            content: rows,
            size: requested_size,
            has_next: false,
            next_cursor_id: None,
        }
    }
}

/// Errors from validating a page request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageRequestError {
    /// Requested size is zero or above the configured maximum.
    #[error("Page size must be between 1 and {max}, got {requested}")]
    InvalidSize {
        /// Size the caller asked for.
        requested: usize,
        /// Largest size allowed.
        max: usize,
    },
}

/// A validated request for one page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRequest<Id = u64> {
    cursor: Option<Id>,
    size: usize,
}

impl<Id: Copy> CursorRequest<Id> {
    /// Validate a page request.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError::InvalidSize`] if `size` is `0` or greater
    /// than `max_size`.
    pub fn new(
        cursor: Option<Id>,
        size: usize,
        max_size: usize,
    ) -> Result<Self, PageRequestError> {
        if size == 0 || size > max_size {
            return Err(PageRequestError::InvalidSize {
                requested: size,
                max: max_size,
            });
        }
        Ok(Self { cursor, size })
    }

    /// Id the page starts at, `None` for the first page.
    #[must_use]
    pub fn cursor(&self) -> Option<Id> {
        self.cursor
    }

    /// Requested page size.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of rows the query must fetch: one more than the page size,
    /// saturating at `usize::MAX`.
    #[must_use]
    pub const fn fetch_limit(&self) -> usize {
        self.size.saturating_add(1)
    }

    /// Turn the over-fetched rows for this request into a page.
    #[must_use]
    pub fn paginate<T>(&self, rows: Vec<T>, id_of: impl Fn(&T) -> Id) -> CursorPage<T, Id> {
        paginate(rows, self.size, id_of)
    }
}
