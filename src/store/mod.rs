//! Key-value store abstraction for leader election.
//!
//! Elections run against any store that can provide three primitives:
//!
//! 1. **Leased keys** - keys bound to a TTL-bounded lease, deleted by the
//!    store when the lease expires or is revoked.
//! 2. **Revision-ordered conditional create** - a transaction that creates a
//!    key only if it has never existed, recording a monotonically increasing
//!    create revision that totally orders entries.
//! 3. **Ordered prefix watches** - a stream of change events over a key
//!    prefix, startable from a known past revision without gaps.
//!
//! The [`KvStore`] trait captures exactly that contract. Backends are passed
//! around as `Arc<dyn KvStore>`; [`MockStore`] is the in-memory reference
//! implementation used by this crate's tests.
//!
//! ```text
//! ┌──────────┐  lease / create / watch   ┌─────────────┐
//! │ Election │ ─────────────────────────▶│  dyn KvStore │
//! └──────────┘                           └──────┬──────┘
//!                                               │
//!                               MockStore / real client binding
//! ```

pub mod error;
pub mod mock;
pub mod types;

pub use error::StoreError;
pub use mock::MockStore;
pub use types::{
    CreateResult, KeyValue, LeaseId, WatchEvent, WatchEventType, WatchOptions, WatchResponse,
    Watcher,
};

use async_trait::async_trait;

/// The store contract leader election requires.
///
/// # Implementation requirements
///
/// - **Thread-safe and async**: the trait requires `Send + Sync + 'static`
///   and all operations are async; elections share one backend handle across
///   several tasks.
/// - **Revision ordering**: `create` and `put` must observe a single
///   monotonically increasing store revision, and `watch` must deliver events
///   in that order, replaying from `start_revision` without gaps.
/// - **Lease-bound lifetime**: keys created with a lease must be deleted by
///   the backend when the lease expires or is revoked, producing delete
///   events on matching watches.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Grants a new lease with the given TTL in seconds.
    async fn lease_grant(&self, ttl_secs: u64) -> Result<LeaseId, StoreError>;

    /// Refreshes a lease, restarting its TTL.
    ///
    /// # Errors
    ///
    /// [`StoreError::LeaseNotFound`] when the lease has expired or was
    /// revoked; the caller must treat this as lease loss.
    async fn lease_keep_alive(&self, lease: LeaseId) -> Result<(), StoreError>;

    /// Revokes a lease, deleting every key bound to it.
    ///
    /// Revoking an already-gone lease is not an error.
    async fn lease_revoke(&self, lease: LeaseId) -> Result<(), StoreError>;

    /// Conditionally creates `key` bound to `lease`.
    ///
    /// Semantics of the underlying transaction: *if* the key's create
    /// revision is zero (it has never existed) *then* put `(key, value)`
    /// bound to `lease`, *else* get the current entry. The returned
    /// [`CreateResult`] carries the response-header revision and, on the get
    /// branch, the pre-existing entry.
    async fn create(
        &self,
        key: &str,
        value: &str,
        lease: LeaseId,
    ) -> Result<CreateResult, StoreError>;

    /// Unconditionally writes `key`, returning the new store revision.
    ///
    /// The write carries **no** lease binding: an existing binding is
    /// detached and the key no longer dies with any lease.
    async fn put(&self, key: &str, value: &str) -> Result<i64, StoreError>;

    /// Returns the entry under `prefix` with the smallest create revision,
    /// or `None` when the prefix is empty.
    async fn first_created(&self, prefix: &str) -> Result<Option<KeyValue>, StoreError>;

    /// Deletes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Opens an ordered watch stream over `prefix`.
    ///
    /// With a non-zero `start_revision` in `options`, events at or after that
    /// revision are replayed before live events, with no gap between the two.
    /// With `require_leader`, the stream is cancelled promptly when the store
    /// has no quorum leader.
    async fn watch(&self, prefix: &str, options: WatchOptions) -> Result<Watcher, StoreError>;
}
