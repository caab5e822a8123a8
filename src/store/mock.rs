//! In-memory implementation of the [`KvStore`] trait for testing.
//!
//! `MockStore` models the store semantics elections depend on: a single
//! monotonically increasing revision, lease-bound key lifetimes, and watch
//! streams that replay from a past revision without gaps. It also exposes
//! fault-injection controls so tests can exercise connectivity loss, stalled
//! requests, quorum loss, and out-of-band lease expiry.
//!
//! Handles share state: cloning a `MockStore` clones the inner `Arc`, so
//! several election instances wired to clones of one store behave like
//! candidates talking to one cluster.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::error::StoreError;
use super::types::{
    CreateResult, KeyValue, LeaseId, WatchEvent, WatchEventType, WatchOptions, WatchResponse,
    Watcher,
};
use super::KvStore;

/// A stored entry together with its lease binding.
#[derive(Debug, Clone)]
struct Entry {
    kv: KeyValue,
    lease: LeaseId,
}

/// A granted lease and the keys bound to it.
#[derive(Debug, Clone, Default)]
struct LeaseRecord {
    ttl_secs: u64,
    keys: HashSet<String>,
}

/// A registered watch stream.
struct WatcherEntry {
    prefix: String,
    require_leader: bool,
    tx: mpsc::UnboundedSender<WatchResponse>,
}

#[derive(Default)]
struct State {
    revision: i64,
    entries: BTreeMap<String, Entry>,
    leases: HashMap<i64, LeaseRecord>,
    next_lease: i64,
    watchers: Vec<WatcherEntry>,
    /// Every change ever made, in revision order; watches opened with a past
    /// start revision replay their suffix of this journal.
    journal: Vec<(i64, WatchEvent)>,
    reachable: bool,
    stalled: bool,
    has_quorum: bool,
}

impl State {
    fn new() -> Self {
        Self {
            reachable: true,
            has_quorum: true,
            ..Self::default()
        }
    }

    /// Journals an event at the current revision and fans it out to matching
    /// live watchers. Closed watchers are pruned here.
    fn record(&mut self, event: WatchEvent) {
        self.journal.push((self.revision, event.clone()));
        self.watchers.retain(|w| !w.tx.is_closed());
        for watcher in &self.watchers {
            if event.kv.key.starts_with(&watcher.prefix) {
                let _ = watcher.tx.send(WatchResponse::events(vec![event.clone()]));
            }
        }
    }

    /// Removes a key, unbinds its lease, and journals the delete.
    fn remove_entry(&mut self, key: &str) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };
        if let Some(record) = self.leases.get_mut(&entry.lease.0) {
            record.keys.remove(key);
        }
        self.revision += 1;
        self.record(WatchEvent {
            event_type: WatchEventType::Delete,
            kv: KeyValue {
                key: key.to_string(),
                value: String::new(),
                create_revision: entry.kv.create_revision,
            },
        });
    }

    /// Drops a lease and deletes every key bound to it.
    fn drop_lease(&mut self, lease: LeaseId) {
        let Some(record) = self.leases.remove(&lease.0) else {
            return;
        };
        let mut keys: Vec<String> = record.keys.into_iter().collect();
        keys.sort();
        for key in keys {
            self.remove_entry(&key);
        }
    }
}

/// An in-memory, revision-ordered, leased, watchable key-value store.
///
/// # Example
///
/// ```
/// use ballot::store::{KvStore, MockStore};
///
/// # async fn example() -> Result<(), ballot::store::StoreError> {
/// let store = MockStore::new();
/// let lease = store.lease_grant(5).await?;
/// let result = store.create("/elections/demo1", "alice", lease).await?;
/// assert!(result.created());
///
/// let leader = store.first_created("/elections/demo").await?.unwrap();
/// assert_eq!(leader.value, "alice");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MockStore {
    inner: Arc<Mutex<State>>,
}

impl MockStore {
    /// Creates an empty store with quorum available and no faults injected.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Fails fast or stalls according to the injected fault flags.
    async fn guard(&self) -> Result<(), StoreError> {
        let (stalled, reachable) = {
            let state = self.inner.lock().await;
            (state.stalled, state.reachable)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        if !reachable {
            return Err(StoreError::unavailable("store unreachable"));
        }
        Ok(())
    }

    /// When `false`, every operation fails fast with
    /// [`StoreError::Unavailable`].
    pub async fn set_reachable(&self, reachable: bool) {
        self.inner.lock().await.reachable = reachable;
    }

    /// When `true`, every operation hangs indefinitely (in-flight requests
    /// are not resumed by clearing the flag). Callers with deadline-bounded
    /// requests observe timeouts, as they would against a partitioned
    /// cluster.
    pub async fn set_stalled(&self, stalled: bool) {
        self.inner.lock().await.stalled = stalled;
    }

    /// Simulates loss (or recovery) of the store's quorum leader. On loss,
    /// watches opened with `require_leader` receive a cancellation response
    /// and end.
    pub async fn set_quorum(&self, has_quorum: bool) {
        let mut state = self.inner.lock().await;
        state.has_quorum = has_quorum;
        if !has_quorum {
            let mut kept = Vec::new();
            for watcher in state.watchers.drain(..) {
                if watcher.require_leader {
                    let _ = watcher.tx.send(WatchResponse::canceled());
                } else {
                    kept.push(watcher);
                }
            }
            state.watchers = kept;
        }
    }

    /// Expires a lease out-of-band, as the server would after missed
    /// keepalives: all bound keys are deleted (with delete events) and
    /// subsequent keepalives fail with [`StoreError::LeaseNotFound`].
    pub async fn expire_lease(&self, lease: LeaseId) {
        self.inner.lock().await.drop_lease(lease);
    }

    /// Current store revision.
    pub async fn current_revision(&self) -> i64 {
        self.inner.lock().await.revision
    }

    /// Reads a single entry.
    pub async fn get(&self, key: &str) -> Option<KeyValue> {
        self.inner
            .lock()
            .await
            .entries
            .get(key)
            .map(|e| e.kv.clone())
    }

    /// All entries under a prefix, in key order.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<KeyValue> {
        self.inner
            .lock()
            .await
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, e)| e.kv.clone())
            .collect()
    }

    /// Whether a lease is still live.
    pub async fn lease_is_live(&self, lease: LeaseId) -> bool {
        self.inner.lock().await.leases.contains_key(&lease.0)
    }

    /// The TTL a live lease was granted with.
    pub async fn lease_ttl(&self, lease: LeaseId) -> Option<u64> {
        self.inner
            .lock()
            .await
            .leases
            .get(&lease.0)
            .map(|record| record.ttl_secs)
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KvStore for MockStore {
    async fn lease_grant(&self, ttl_secs: u64) -> Result<LeaseId, StoreError> {
        self.guard().await?;
        let mut state = self.inner.lock().await;
        state.next_lease += 1;
        let id = LeaseId(state.next_lease);
        state.leases.insert(
            id.0,
            LeaseRecord {
                ttl_secs,
                keys: HashSet::new(),
            },
        );
        Ok(id)
    }

    async fn lease_keep_alive(&self, lease: LeaseId) -> Result<(), StoreError> {
        self.guard().await?;
        let state = self.inner.lock().await;
        if state.leases.contains_key(&lease.0) {
            Ok(())
        } else {
            Err(StoreError::lease_not_found(lease))
        }
    }

    async fn lease_revoke(&self, lease: LeaseId) -> Result<(), StoreError> {
        self.guard().await?;
        self.inner.lock().await.drop_lease(lease);
        Ok(())
    }

    async fn create(
        &self,
        key: &str,
        value: &str,
        lease: LeaseId,
    ) -> Result<CreateResult, StoreError> {
        self.guard().await?;
        let mut state = self.inner.lock().await;
        if !state.leases.contains_key(&lease.0) {
            return Err(StoreError::lease_not_found(lease));
        }
        if let Some(entry) = state.entries.get(key) {
            return Ok(CreateResult {
                revision: state.revision,
                existing: Some(entry.kv.clone()),
            });
        }
        state.revision += 1;
        let kv = KeyValue {
            key: key.to_string(),
            value: value.to_string(),
            create_revision: state.revision,
        };
        state.entries.insert(
            key.to_string(),
            Entry {
                kv: kv.clone(),
                lease,
            },
        );
        if let Some(record) = state.leases.get_mut(&lease.0) {
            record.keys.insert(key.to_string());
        }
        let revision = state.revision;
        state.record(WatchEvent {
            event_type: WatchEventType::Put,
            kv,
        });
        Ok(CreateResult {
            revision,
            existing: None,
        })
    }

    async fn put(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        self.guard().await?;
        let mut state = self.inner.lock().await;
        state.revision += 1;
        let revision = state.revision;
        // A plain put carries no lease: detach any existing binding.
        let updated = state.entries.get_mut(key).map(|entry| {
            let old_lease = entry.lease;
            entry.lease = LeaseId::NONE;
            entry.kv.value = value.to_string();
            (entry.kv.clone(), old_lease)
        });
        let kv = match updated {
            Some((kv, old_lease)) => {
                if let Some(record) = state.leases.get_mut(&old_lease.0) {
                    record.keys.remove(key);
                }
                kv
            }
            None => {
                let kv = KeyValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    create_revision: revision,
                };
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        kv: kv.clone(),
                        lease: LeaseId::NONE,
                    },
                );
                kv
            }
        };
        state.record(WatchEvent {
            event_type: WatchEventType::Put,
            kv,
        });
        Ok(revision)
    }

    async fn first_created(&self, prefix: &str) -> Result<Option<KeyValue>, StoreError> {
        self.guard().await?;
        let state = self.inner.lock().await;
        Ok(state
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, e)| e.kv.clone())
            .min_by_key(|kv| kv.create_revision))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.guard().await?;
        self.inner.lock().await.remove_entry(key);
        Ok(())
    }

    async fn watch(&self, prefix: &str, options: WatchOptions) -> Result<Watcher, StoreError> {
        self.guard().await?;
        let mut state = self.inner.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();

        if options.require_leader && !state.has_quorum {
            let _ = tx.send(WatchResponse::canceled());
            return Ok(Watcher::new(rx));
        }

        // Replay the journal suffix before going live; the lock serializes
        // replay against concurrent mutations, so there is no gap.
        if options.start_revision > 0 {
            for (revision, event) in &state.journal {
                if *revision >= options.start_revision && event.kv.key.starts_with(prefix) {
                    let _ = tx.send(WatchResponse::events(vec![event.clone()]));
                }
            }
        }

        state.watchers.push(WatcherEntry {
            prefix: prefix.to_string(),
            require_leader: options.require_leader,
            tx,
        });
        Ok(Watcher::new(rx))
    }
}
