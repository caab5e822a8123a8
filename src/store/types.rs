//! Data types for the key-value store contract.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::StoreError;

/// A lease identifier issued by the store.
///
/// Leases bound to keys give those keys a server-enforced lifetime: when the
/// lease expires or is revoked, every bound key is deleted. The zero value is
/// reserved as the [`NONE`](LeaseId::NONE) sentinel meaning "no lease held".
///
/// The hex rendering of a lease id is load-bearing: candidate keys are named
/// `<prefix><hex>`, so the same encoding must be used wherever a key is
/// composed or compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(pub i64);

impl LeaseId {
    /// Sentinel for the lost / not-yet-acquired state.
    pub const NONE: LeaseId = LeaseId(0);

    /// Returns `true` if this is the [`NONE`](LeaseId::NONE) sentinel.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Lowercase hex rendering with no prefix, e.g. `7a3f`.
    pub fn hex(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A key-value entry as observed in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Full key, including any prefix.
    pub key: String,
    /// Value bytes, interpreted as UTF-8 text by this crate.
    pub value: String,
    /// Store revision at which this key was created. Monotonically increasing
    /// across the store; establishes a strict total order among entries.
    pub create_revision: i64,
}

/// Outcome of the conditional create transaction.
///
/// See [`KvStore::create`](super::KvStore::create): when the key did not
/// exist, the put branch ran and `existing` is `None`; when it did, the get
/// branch ran and `existing` carries the current entry.
#[derive(Debug, Clone)]
pub struct CreateResult {
    /// Store revision in the transaction response header.
    pub revision: i64,
    /// The pre-existing entry, when the create condition failed.
    pub existing: Option<KeyValue>,
}

impl CreateResult {
    /// Returns `true` if the put branch ran and the key was created.
    pub fn created(&self) -> bool {
        self.existing.is_none()
    }
}

/// The kind of change a watch event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventType {
    /// A key was created or its value replaced.
    Put,
    /// A key was removed, by an explicit delete or by lease expiry.
    Delete,
}

/// A single change observed on a watch stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Whether the key was written or removed.
    pub event_type: WatchEventType,
    /// The affected entry. For deletes, `value` is empty and
    /// `create_revision` is that of the removed entry.
    pub kv: KeyValue,
}

/// One message on a watch stream.
///
/// A response carries zero or more ordered events, or signals stream
/// cancellation by the server (`canceled`) or a stream-level error. After a
/// canceled or errored response the stream delivers nothing further.
#[derive(Debug, Clone, Default)]
pub struct WatchResponse {
    /// Set when the server cancelled the stream (for example on loss of the
    /// store's quorum leader while `require_leader` was requested).
    pub canceled: bool,
    /// Changes in store order.
    pub events: Vec<WatchEvent>,
    /// Stream-level error, independent of cancellation.
    pub error: Option<StoreError>,
}

impl WatchResponse {
    /// A response carrying a batch of events.
    pub fn events(events: Vec<WatchEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// A server-side cancellation response.
    pub fn canceled() -> Self {
        Self {
            canceled: true,
            ..Self::default()
        }
    }
}

/// Options for opening a watch stream.
///
/// # Example
///
/// ```
/// use ballot::store::WatchOptions;
///
/// let options = WatchOptions::new()
///     .with_start_revision(42)
///     .with_require_leader(true);
/// assert_eq!(options.start_revision, 42);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchOptions {
    /// First store revision, inclusive, the stream must deliver. Events that
    /// happened at or after this revision are replayed before live events.
    /// Zero means "from now on".
    pub start_revision: i64,
    /// Require the store to have a live quorum leader; the stream is
    /// cancelled promptly when it does not, instead of stalling.
    pub require_leader: bool,
}

impl WatchOptions {
    /// Creates options with defaults: live events only, no leader requirement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first revision, inclusive, the stream must deliver.
    pub fn with_start_revision(mut self, revision: i64) -> Self {
        self.start_revision = revision;
        self
    }

    /// Requires a live quorum leader for the lifetime of the stream.
    pub fn with_require_leader(mut self, require: bool) -> Self {
        self.require_leader = require;
        self
    }
}

/// A handle on an open watch stream.
///
/// Responses arrive in store order. Dropping the watcher cancels the stream;
/// the store prunes the server side on its next delivery attempt.
pub struct Watcher {
    /// The channel carrying watch responses.
    pub receiver: mpsc::UnboundedReceiver<WatchResponse>,
}

impl Watcher {
    /// Creates a watcher over the given receiver.
    pub fn new(receiver: mpsc::UnboundedReceiver<WatchResponse>) -> Self {
        Self { receiver }
    }

    /// Receives the next response.
    ///
    /// Returns `None` when the stream has ended (cancelled, errored, or the
    /// store went away).
    pub async fn recv(&mut self) -> Option<WatchResponse> {
        self.receiver.recv().await
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("receiver", &"<mpsc::UnboundedReceiver>")
            .finish()
    }
}
