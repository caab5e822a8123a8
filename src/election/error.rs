//! Error types for elections.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while participating in an election.
///
/// Cloneable so one error can be fanned out to every observer. Transient
/// store failures are retried internally; they still surface here (inside
/// [`Event`](super::Event)) so embedders can log or alert, but no caller
/// action is needed for the election to recover.
#[derive(Error, Debug, Clone)]
pub enum ElectionError {
    /// The election name was empty. Surfaced at construction, not retryable.
    #[error("election name cannot be empty")]
    EmptyElectionName,

    /// A store operation failed.
    #[error("{context}: {source}")]
    Store {
        /// What the election was doing when the store failed.
        context: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The election prefix held no entries when a leader was expected.
    #[error("no leader found under the election prefix")]
    NoLeader,

    /// The server cancelled the watch stream.
    #[error("remote server cancelled watch")]
    WatchCanceled,

    /// A TTL-bounded operation did not complete in time.
    #[error("{context}: deadline exceeded")]
    Deadline {
        /// What the election was doing when the deadline passed.
        context: String,
    },
}

impl ElectionError {
    /// Creates a `Store` error with context.
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Deadline` error with context.
    pub fn deadline(context: impl Into<String>) -> Self {
        Self::Deadline {
            context: context.into(),
        }
    }

    /// Returns `true` for the construction-time configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::EmptyElectionName)
    }

    /// Returns `true` if the election prefix was unexpectedly empty.
    pub fn is_no_leader(&self) -> bool {
        matches!(self, Self::NoLeader)
    }

    /// Returns `true` if the server cancelled the watch.
    pub fn is_watch_canceled(&self) -> bool {
        matches!(self, Self::WatchCanceled)
    }

    /// Returns `true` for store-level failures.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}
