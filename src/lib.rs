//! # ballot
//!
//! Lease-based leader election over a revision-ordered, watchable key-value
//! store.
//!
//! A set of processes (candidates) compete for exclusive leadership of a
//! named election. Each candidate holds a [`Session`] - a lease on the store,
//! kept alive in the background - and registers a key under the election's
//! prefix bound to that lease. The key with the smallest create revision
//! wins; every candidate watches the prefix and receives an [`Event`] on each
//! leadership change. When a leader's process dies or partitions, its lease
//! expires and the store deletes its key, electing the next candidate within
//! the TTL.
//!
//! ```text
//! ┌───────────┐   lease + keys + watch   ┌──────────────┐
//! │ candidate │ ────────────────────────▶│  dyn KvStore │◀──── other
//! │ (Election)│ ◀──────────────────────  └──────────────┘      candidates
//! └───────────┘   ordered change events
//! ```
//!
//! The store is abstracted behind the [`KvStore`] trait; [`MockStore`] is the
//! in-memory implementation used throughout the tests.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ballot::{Election, ElectionConfig, MockStore};
//!
//! # async fn example() -> Result<(), ballot::ElectionError> {
//! let store = Arc::new(MockStore::new());
//!
//! // Returns only after determining the current leader.
//! let election = Election::new(
//!     store,
//!     ElectionConfig::new("presidental")
//!         .with_candidate("alice")
//!         .with_ttl_secs(5)
//!         .with_event_observer(|event| {
//!             println!("leader: {} (us: {})", event.leader_data, event.is_leader);
//!         }),
//! )
//! .await?;
//!
//! if election.is_leader() {
//!     // do leader-only work
//! }
//!
//! // Step down but keep campaigning...
//! election.concede().await?;
//! // ...or stop participating entirely.
//! election.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod election;
pub mod session;
pub mod store;

pub use backoff::BackoffCounter;

// Election exports
pub use election::{
    default_candidate, AlwaysLeader, Election, ElectionConfig, ElectionError, Elector, Event,
    EventObserver, ELECTIONS_PREFIX,
};

// Session exports
pub use session::{Session, SessionConfig, SessionObserver, DEFAULT_TTL_SECS};

// Store exports
pub use store::{
    CreateResult, KeyValue, KvStore, LeaseId, MockStore, StoreError, WatchEvent, WatchEventType,
    WatchOptions, WatchResponse, Watcher,
};
