//! Error types for the key-value store contract.

use thiserror::Error;

use super::types::LeaseId;

/// Errors surfaced by a [`KvStore`](super::KvStore) backend.
///
/// Variants are cloneable so they can be fanned out to every election
/// observer without consuming the original.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store could not be reached or the request did not complete.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The lease does not exist or has expired.
    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),

    /// The watch stream ended unexpectedly.
    #[error("watch closed: {0}")]
    WatchClosed(String),

    /// A backend-internal failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a `LeaseNotFound` error.
    pub fn lease_not_found(lease: LeaseId) -> Self {
        Self::LeaseNotFound(lease)
    }

    /// Creates a `WatchClosed` error.
    pub fn watch_closed(message: impl Into<String>) -> Self {
        Self::WatchClosed(message.into())
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` for connectivity failures worth retrying.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Returns `true` if the error signals a lost lease.
    pub fn is_lease_not_found(&self) -> bool {
        matches!(self, Self::LeaseNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_error() {
        let err = StoreError::unavailable("connection refused");
        assert!(err.is_unavailable());
        assert!(!err.is_lease_not_found());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_lease_not_found_error() {
        let err = StoreError::lease_not_found(LeaseId(0xab));
        assert!(err.is_lease_not_found());
        assert!(err.to_string().contains("ab"));
    }

    #[test]
    fn test_watch_closed_error() {
        let err = StoreError::watch_closed("stream reset");
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("stream reset"));
    }
}
