//! Error types shared by the store-facing components.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`KeyValueStore`](crate::kv::KeyValueStore).
///
/// None of these are surfaced to end users directly: the idempotency gate
/// turns them into a rejection, the cache and the view counter into a miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, reset, ...).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A command did not complete within the configured timeout.
    #[error("Store command timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error or an unexpected reply.
    #[error("Store command failed: {0}")]
    Command(String),
}

impl StoreError {
    /// Returns `true` if the error indicates the store itself is down or
    /// unreachable, as opposed to a rejected command.
    ///
    /// # Examples
    ///
    /// ```
    /// # use storefront_core::StoreError;
    /// assert!(StoreError::Unavailable("refused".into()).is_connectivity());
    /// assert!(!StoreError::Command("WRONGTYPE".into()).is_connectivity());
    /// ```
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Errors from encoding or decoding cached values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// The stored bytes are not a valid encoding of the value type.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = StoreError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Store command timed out after 250ms");
        assert!(err.is_connectivity());
    }
}
