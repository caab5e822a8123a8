//! Leader election over a leased, revision-ordered key-value store.
//!
//! Each candidate registers a key named `<prefix><lease-hex>` under the
//! election prefix, bound to its session's lease. The entry with the smallest
//! create revision is the leader; a prefix watch turns store changes into
//! [`Event`]s for every registered observer.
//!
//! # Lifecycle
//!
//! ```text
//!           ┌───────────┐  lease acquired   ┌─────────────┐
//! start ───▶│ wait lease│ ─────────────────▶│ registering │◀─┐
//!           └───────────┘                   └──────┬──────┘  │ backoff
//!                 ▲                                │ ok(rev) ─┘ on error
//!                 │ session reset                  ▼
//!                 │ on fatal error          ┌─────────────┐
//!                 └─────────────────────────│  watching   │
//!                                           └──────┬──────┘
//!                                                  │ close
//!                                                  ▼
//!                                           withdraw, done
//! ```
//!
//! A lost lease stops the running campaign and clears leadership; the next
//! acquired lease starts a fresh campaign under a new key (and therefore a
//! larger create revision). Fatal watch failures reset the session, which
//! cascades into the same recovery.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ballot::election::{Election, ElectionConfig};
//! use ballot::store::MockStore;
//!
//! # async fn example() -> Result<(), ballot::election::ElectionError> {
//! let store = Arc::new(MockStore::new());
//! let election = Election::new(
//!     store,
//!     ElectionConfig::new("presidental")
//!         .with_candidate("alice")
//!         .with_event_observer(|event| {
//!             if event.is_leader {
//!                 // do leader-only work
//!             }
//!         }),
//! )
//! .await?;
//!
//! if election.is_leader() {
//!     // thread-safe leadership check
//! }
//!
//! election.close().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;

pub use error::ElectionError;
pub use event::{Event, EventObserver};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffCounter;
use crate::session::{Session, SessionConfig, SessionObserver, DEFAULT_TTL_SECS};
use crate::store::{KeyValue, KvStore, LeaseId, StoreError, WatchOptions};

/// Prefix prepended to every election name.
pub const ELECTIONS_PREFIX: &str = "/elections/";

/// Observer id for the configuration-supplied callback.
const OBSERVER_CONF: &str = "conf";

/// Observer id for the internal construction-readiness callback.
const OBSERVER_INIT: &str = "init";

/// Initial retry delay for registration and watch errors.
const CAMPAIGN_BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// Returns the OS hostname, the default candidate name.
pub fn default_candidate() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Configuration for an [`Election`].
#[derive(Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// The name of the election (e.g. `scout`, `blackbird`). Required.
    pub election: String,
    /// The name of this candidate (e.g. `worker-n01`). Defaults to the OS
    /// hostname when empty.
    pub candidate: String,
    /// Seconds before a disconnected leader's key expires. Zero selects the
    /// default of 5. Also bounds teardown operations and retry delays.
    pub ttl_secs: u64,
    /// Optional callback invoked on every leadership change or error,
    /// registered under the id `"conf"`.
    #[serde(skip)]
    pub event_observer: Option<EventObserver>,
}

impl ElectionConfig {
    /// Creates a configuration for the named election.
    pub fn new(election: impl Into<String>) -> Self {
        Self {
            election: election.into(),
            candidate: String::new(),
            ttl_secs: 0,
            event_observer: None,
        }
    }

    /// Sets the candidate name.
    pub fn with_candidate(mut self, candidate: impl Into<String>) -> Self {
        self.candidate = candidate.into();
        self
    }

    /// Sets the leadership TTL in seconds.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Sets the event observer.
    pub fn with_event_observer(mut self, observer: impl Fn(Event) + Send + Sync + 'static) -> Self {
        self.event_observer = Some(Arc::new(observer));
        self
    }
}

impl std::fmt::Debug for ElectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElectionConfig")
            .field("election", &self.election)
            .field("candidate", &self.candidate)
            .field("ttl_secs", &self.ttl_secs)
            .field(
                "event_observer",
                &self.event_observer.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// State shared between the election handle and its background tasks.
struct Shared {
    store: Arc<dyn KvStore>,
    /// Full election prefix, `/elections/<name>`.
    prefix: String,
    candidate: String,
    ttl: Duration,
    observers: std::sync::Mutex<HashMap<String, EventObserver>>,
    is_leader: AtomicBool,
    /// This candidate's key under the prefix; set at registration.
    key: std::sync::Mutex<String>,
}

impl Shared {
    fn add_observer(&self, id: impl Into<String>, observer: EventObserver) {
        self.observers
            .lock()
            .expect("observer registry lock")
            .insert(id.into(), observer);
    }

    fn remove_observer(&self, id: &str) {
        self.observers
            .lock()
            .expect("observer registry lock")
            .remove(id);
    }

    /// Invokes every observer with the event, serially. The registry lock is
    /// released before any callback runs, so callbacks may re-enter the
    /// registry.
    fn dispatch(&self, event: Event) {
        let observers: Vec<EventObserver> = self
            .observers
            .lock()
            .expect("observer registry lock")
            .values()
            .cloned()
            .collect();
        for observer in observers {
            observer(event.clone());
        }
    }

    /// Updates the leadership flag from the new leader entry and notifies
    /// observers. An empty entry announces "no known leader" (used on
    /// shutdown) and always clears the flag.
    fn notify_leader(&self, kv: &KeyValue) {
        let own = self.key.lock().expect("candidate key lock").clone();
        let is_leader = !kv.key.is_empty() && kv.key == own;
        self.is_leader.store(is_leader, Ordering::Relaxed);
        info!(leader_key = %kv.key, is_leader, "leadership changed");
        self.dispatch(Event::leader_change(kv, is_leader));
    }

    /// Reports an error to observers; any error clears leadership.
    fn notify_err(&self, err: ElectionError) {
        self.is_leader.store(false, Ordering::Relaxed);
        self.dispatch(Event::error(err));
    }

    /// Reports a fatal error and resets the session in the background; the
    /// new lease that follows restarts the campaign from registration.
    fn on_fatal(&self, session: &Session, err: ElectionError) {
        error!(error = %err, "fatal campaign error, resetting session");
        self.notify_err(err);
        let session = session.clone();
        tokio::spawn(async move {
            session.reset().await;
        });
    }

    /// Writes this candidate's key under the prefix, bound to `lease`, and
    /// returns the revision the watch must start from.
    async fn register_candidate(&self, lease: LeaseId) -> Result<i64, ElectionError> {
        let key = format!("{}{}", self.prefix, lease.hex());
        *self.key.lock().expect("candidate key lock") = key.clone();

        let result = self
            .store
            .create(&key, &self.candidate, lease)
            .await
            .map_err(|err| ElectionError::store("during campaign registration", err))?;

        match result.existing {
            None => Ok(result.revision),
            Some(existing) => {
                // The session should have told us about a disconnect and the
                // store should have granted a unique lease id, so an existing
                // entry under our key is unexpected. Write our candidate name
                // over it and assume ownership.
                warn!(%key, "candidate key already present, assuming ownership");
                if existing.value != self.candidate {
                    self.store
                        .put(&key, &self.candidate)
                        .await
                        .map_err(|err| ElectionError::store("during campaign registration", err))?;
                }
                Ok(existing.create_revision)
            }
        }
    }

    /// The entry under the prefix with the smallest create revision.
    async fn current_leader(&self) -> Result<Option<KeyValue>, ElectionError> {
        self.store
            .first_created(&self.prefix)
            .await
            .map_err(|err| ElectionError::store("while querying for current leader", err))
    }

    /// Deletes this candidate's key, bounded by the TTL: if the store stays
    /// unreachable longer than that, the lease has expired and taken the key
    /// with it. Clears leadership regardless of outcome.
    async fn withdraw(&self) -> Result<(), ElectionError> {
        let key = self.key.lock().expect("candidate key lock").clone();
        let result = timeout(self.ttl, self.store.delete(&key)).await;
        self.is_leader.store(false, Ordering::Relaxed);
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ElectionError::store(
                format!("while withdrawing campaign '{key}'"),
                err,
            )),
            Err(_) => Err(ElectionError::deadline(format!(
                "while withdrawing campaign '{key}'"
            ))),
        }
    }
}

/// How a watch attempt ended.
enum WatchOutcome {
    /// Local shutdown: withdrawn and reported, nothing left to do.
    Done,
    /// Fatal: reported and a session reset is underway; the campaign exits
    /// and the next lease restarts it.
    Fatal,
    /// Could not enter the watch; retry registration after backoff.
    Retry(ElectionError),
}

/// One campaign under one lease: register, then watch until shutdown, a
/// fatal failure, or a retryable error.
async fn run_campaign(
    shared: Arc<Shared>,
    session: Session,
    lease: LeaseId,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = BackoffCounter::new(CAMPAIGN_BACKOFF_INITIAL, shared.ttl, 2.0);
    loop {
        let revision = match shared.register_candidate(lease).await {
            Ok(revision) => revision,
            Err(err) => {
                warn!(error = %err, "campaign registration failed");
                shared.notify_err(err);
                tokio::select! {
                    _ = sleep(backoff.next()) => continue,
                    _ = shutdown.changed() => return,
                }
            }
        };
        debug!(lease = %lease, revision, "campaign registered");

        match watch_campaign(&shared, &session, revision, &mut shutdown).await {
            WatchOutcome::Done | WatchOutcome::Fatal => return,
            WatchOutcome::Retry(err) => {
                warn!(error = %err, "campaign watch failed");
                shared.notify_err(err);
                tokio::select! {
                    _ = sleep(backoff.next()) => {}
                    _ = shutdown.changed() => {
                        if let Err(err) = shared.withdraw().await {
                            shared.notify_err(err);
                        }
                        return;
                    }
                }
            }
        }
    }
}

/// Watches the election prefix from `revision + 1`, tracking the current
/// leader and notifying observers on every identity change.
async fn watch_campaign(
    shared: &Arc<Shared>,
    session: &Session,
    revision: i64,
    shutdown: &mut watch::Receiver<bool>,
) -> WatchOutcome {
    let mut leader = match shared.current_leader().await {
        Err(err) => return WatchOutcome::Retry(err),
        // Our own key was just written, so an empty prefix means the store
        // state is inconsistent with our lease; restart from a fresh session.
        Ok(None) => {
            shared.on_fatal(session, ElectionError::NoLeader);
            return WatchOutcome::Fatal;
        }
        Ok(Some(kv)) => kv,
    };

    let options = WatchOptions::new()
        .with_start_revision(revision + 1)
        .with_require_leader(true);
    let mut watcher = match shared.store.watch(&shared.prefix, options).await {
        Ok(watcher) => watcher,
        Err(err) => {
            return WatchOutcome::Retry(ElectionError::store("during campaign watch", err))
        }
    };

    // Tell the observers who currently leads.
    shared.notify_leader(&leader);

    loop {
        tokio::select! {
            response = watcher.recv() => {
                let Some(response) = response else {
                    shared.on_fatal(
                        session,
                        ElectionError::store(
                            "during campaign watch",
                            StoreError::watch_closed("stream ended"),
                        ),
                    );
                    return WatchOutcome::Fatal;
                };
                if response.canceled {
                    shared.on_fatal(session, ElectionError::WatchCanceled);
                    return WatchOutcome::Fatal;
                }
                if let Some(err) = response.error {
                    shared.on_fatal(
                        session,
                        ElectionError::store("during campaign watch, server returned error", err),
                    );
                    return WatchOutcome::Fatal;
                }

                for change in &response.events {
                    // Only changes to the current leader's key can move
                    // leadership; everything else is a follower coming or
                    // going.
                    if change.kv.key != leader.key {
                        continue;
                    }
                    match shared.current_leader().await {
                        Err(err) => {
                            shared.on_fatal(session, err);
                            return WatchOutcome::Fatal;
                        }
                        Ok(None) => {
                            shared.on_fatal(session, ElectionError::NoLeader);
                            return WatchOutcome::Fatal;
                        }
                        Ok(Some(current)) => {
                            if current.key != leader.key {
                                leader = current;
                                shared.notify_leader(&leader);
                            }
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                drop(watcher);
                if let Err(err) = shared.withdraw().await {
                    shared.notify_err(err);
                }
                // Announce that we no longer know a leader.
                shared.notify_leader(&KeyValue::default());
                return WatchOutcome::Done;
            }
        }
    }
}

/// Consumes session transitions, keeping exactly one campaign task alive
/// while a lease is held and none while it is lost.
async fn run_controller(
    shared: Arc<Shared>,
    session: Session,
    mut transitions: mpsc::UnboundedReceiver<(LeaseId, Option<StoreError>)>,
) {
    let mut campaign: Option<(watch::Sender<bool>, JoinHandle<()>)> = None;

    while let Some((lease, err)) = transitions.recv().await {
        if lease.is_none() {
            // Avoid stopping twice; losses with no campaign running carry no
            // new information.
            let Some((stop, task)) = campaign.take() else {
                continue;
            };
            let _ = stop.send(true);
            let _ = task.await;
            shared.is_leader.store(false, Ordering::Relaxed);
            if let Some(err) = err {
                shared.notify_err(ElectionError::store("lease error", err));
            }
        } else if campaign.is_none() {
            debug!(lease = %lease, "starting campaign");
            let (stop_tx, stop_rx) = watch::channel(false);
            let task = tokio::spawn(run_campaign(
                Arc::clone(&shared),
                session.clone(),
                lease,
                stop_rx,
            ));
            campaign = Some((stop_tx, task));
        }
    }

    // Session task gone; make sure no campaign outlives it.
    if let Some((stop, task)) = campaign.take() {
        let _ = stop.send(true);
        let _ = task.await;
    }
}

/// A handle on one candidate's participation in a named election.
///
/// Construction blocks until the first leadership event so callers know who
/// leads before proceeding; bound the wait with [`tokio::time::timeout`] if
/// the store may be unreachable. Call [`close`](Election::close) when done:
/// dropping the handle without closing leaves the background session running
/// until its lease expires.
pub struct Election {
    shared: Arc<Shared>,
    session: Session,
    controller: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Election {
    /// Creates a new election and submits this candidate for leadership.
    ///
    /// Validates the configuration, starts the session and campaign, and
    /// returns once the first leadership event has been observed. A first
    /// event carrying an error tears the election down and returns it.
    pub async fn new(
        store: Arc<dyn KvStore>,
        config: ElectionConfig,
    ) -> Result<Election, ElectionError> {
        if config.election.is_empty() {
            return Err(ElectionError::EmptyElectionName);
        }
        let ttl_secs = if config.ttl_secs == 0 {
            DEFAULT_TTL_SECS
        } else {
            config.ttl_secs
        };
        let candidate = if config.candidate.is_empty() {
            default_candidate()
        } else {
            config.candidate.clone()
        };

        let shared = Arc::new(Shared {
            store: Arc::clone(&store),
            prefix: format!("{ELECTIONS_PREFIX}{}", config.election),
            candidate,
            ttl: Duration::from_secs(ttl_secs),
            observers: std::sync::Mutex::new(HashMap::new()),
            is_leader: AtomicBool::new(false),
            key: std::sync::Mutex::new(String::new()),
        });

        if let Some(observer) = config.event_observer.clone() {
            shared.add_observer(OBSERVER_CONF, observer);
        }

        // The first event, whatever it is, releases the construction wait.
        let (init_tx, mut init_rx) = mpsc::unbounded_channel();
        shared.add_observer(
            OBSERVER_INIT,
            Arc::new(move |event| {
                let _ = init_tx.send(event);
            }),
        );

        let (transition_tx, transition_rx) = mpsc::unbounded_channel();
        let session_observer: SessionObserver = Arc::new(move |lease, err| {
            let _ = transition_tx.send((lease, err));
        });
        let session = Session::new(
            Arc::clone(&store),
            SessionConfig::new(session_observer).with_ttl_secs(ttl_secs),
        );
        let controller = tokio::spawn(run_controller(
            Arc::clone(&shared),
            session.clone(),
            transition_rx,
        ));

        let election = Election {
            shared: Arc::clone(&shared),
            session,
            controller: std::sync::Mutex::new(Some(controller)),
            closed: AtomicBool::new(false),
        };

        let first = init_rx.recv().await;
        shared.remove_observer(OBSERVER_INIT);
        match first {
            Some(event) => {
                if let Some(err) = event.err {
                    election.close().await;
                    return Err(err);
                }
            }
            None => {
                election.close().await;
                return Err(ElectionError::store(
                    "during election startup",
                    StoreError::internal("election tasks ended before the first event"),
                ));
            }
        }
        Ok(election)
    }

    /// Returns `true` if this candidate is currently leader. Thread-safe.
    pub fn is_leader(&self) -> bool {
        self.shared.is_leader.load(Ordering::Relaxed)
    }

    /// Concedes leadership if held, then continues campaigning.
    ///
    /// Returns `Ok(false)` without side effects when not leader. When leader,
    /// resets the session - re-registering under a new lease and therefore a
    /// strictly larger create revision - then deletes the old key within the
    /// TTL. To concede *and* stop campaigning, call
    /// [`close`](Election::close) instead.
    ///
    /// An `Err` means this candidate was leader and step-down was initiated,
    /// but the old key could not be confirmed deleted; the lease expiry
    /// removes it within the TTL regardless.
    pub async fn concede(&self) -> Result<bool, ElectionError> {
        if !self.is_leader() {
            return Ok(false);
        }
        let old_key = self
            .shared
            .key
            .lock()
            .expect("candidate key lock")
            .clone();
        self.session.reset().await;

        // Make sure the conceded key does not linger for a full TTL.
        match timeout(self.shared.ttl, self.shared.store.delete(&old_key)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(err)) => Err(ElectionError::store(
                format!("while cleaning up campaign '{old_key}'"),
                err,
            )),
            Err(_) => Err(ElectionError::deadline(format!(
                "while cleaning up campaign '{old_key}'"
            ))),
        }
    }

    /// Ends participation: closes the session (revoking the lease), waits for
    /// the campaign to wind down, and emits the terminal
    /// [`is_done`](Event::is_done) event. Idempotent; returns within roughly
    /// one TTL even when the store is unreachable.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.close().await;
        let controller = self
            .controller
            .lock()
            .expect("controller task lock")
            .take();
        if let Some(task) = controller {
            let _ = task.await;
        }
        self.shared.is_leader.store(false, Ordering::Relaxed);
        self.shared.dispatch(Event::done());
    }

    /// Registers an observer under `id`, replacing any existing one with the
    /// same id.
    pub fn add_observer(&self, id: impl Into<String>, observer: impl Fn(Event) + Send + Sync + 'static) {
        self.shared.add_observer(id, Arc::new(observer));
    }

    /// Removes the observer registered under `id`.
    pub fn remove_observer(&self, id: &str) {
        self.shared.remove_observer(id);
    }
}

impl std::fmt::Debug for Election {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Election")
            .field("prefix", &self.shared.prefix)
            .field("candidate", &self.shared.candidate)
            .field("is_leader", &self.is_leader())
            .finish()
    }
}

/// The leadership interface embedders program against.
///
/// [`Election`] is the real implementation; [`AlwaysLeader`] stands in where
/// a component under test should simply behave as the leader.
#[async_trait]
pub trait Elector: Send + Sync {
    /// Returns `true` if this candidate is currently leader.
    fn is_leader(&self) -> bool;

    /// Concedes leadership if held; see [`Election::concede`].
    async fn concede(&self) -> Result<bool, ElectionError>;

    /// Ends participation; see [`Election::close`].
    async fn close(&self);
}

#[async_trait]
impl Elector for Election {
    fn is_leader(&self) -> bool {
        Election::is_leader(self)
    }

    async fn concede(&self) -> Result<bool, ElectionError> {
        Election::concede(self).await
    }

    async fn close(&self) {
        Election::close(self).await
    }
}

/// An [`Elector`] that always reports leadership and never touches a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLeader;

#[async_trait]
impl Elector for AlwaysLeader {
    fn is_leader(&self) -> bool {
        true
    }

    async fn concede(&self) -> Result<bool, ElectionError> {
        Ok(true)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;

    /// Verify the trait is object-safe and can be used as a trait object.
    #[allow(dead_code)]
    fn assert_elector_object_safe(_: &dyn Elector) {}

    #[test]
    fn test_config_builder() {
        let config = ElectionConfig::new("scout")
            .with_candidate("worker-n01")
            .with_ttl_secs(10);
        assert_eq!(config.election, "scout");
        assert_eq!(config.candidate, "worker-n01");
        assert_eq!(config.ttl_secs, 10);
        assert!(config.event_observer.is_none());
    }

    #[test]
    fn test_default_candidate_is_nonempty() {
        assert!(!default_candidate().is_empty());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ElectionConfig::new("scout")
            .with_candidate("worker-n01")
            .with_ttl_secs(10);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ElectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.election, "scout");
        assert_eq!(parsed.candidate, "worker-n01");
        assert_eq!(parsed.ttl_secs, 10);
        // The observer is not part of the serialized form.
        assert!(parsed.event_observer.is_none());
    }

    #[tokio::test]
    async fn test_empty_election_name_is_rejected() {
        let store = Arc::new(MockStore::new());
        let result = Election::new(Arc::clone(&store) as Arc<dyn KvStore>, ElectionConfig::new(""))
            .await;

        assert!(matches!(result, Err(ElectionError::EmptyElectionName)));
        // No session was created: the store never granted a lease.
        assert_eq!(store.current_revision().await, 0);
    }

    #[tokio::test]
    async fn test_solo_candidate_becomes_leader() {
        let store = Arc::new(MockStore::new());
        let election = Election::new(
            Arc::clone(&store) as Arc<dyn KvStore>,
            ElectionConfig::new("presidental")
                .with_candidate("alice")
                .with_ttl_secs(1),
        )
        .await
        .unwrap();

        assert!(election.is_leader());

        let entries = store.keys_with_prefix("/elections/presidental").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "alice");

        election.close().await;
        assert!(!election.is_leader());
    }

    #[tokio::test]
    async fn test_concede_when_not_leader_is_noop() {
        let store = Arc::new(MockStore::new());

        // Occupy the election first so the second candidate follows.
        let leader = Election::new(
            Arc::clone(&store) as Arc<dyn KvStore>,
            ElectionConfig::new("race")
                .with_candidate("alice")
                .with_ttl_secs(1),
        )
        .await
        .unwrap();

        let follower = Election::new(
            Arc::clone(&store) as Arc<dyn KvStore>,
            ElectionConfig::new("race")
                .with_candidate("bob")
                .with_ttl_secs(1),
        )
        .await
        .unwrap();

        assert!(!follower.is_leader());
        assert!(!follower.concede().await.unwrap());
        assert!(leader.is_leader());

        leader.close().await;
        follower.close().await;
    }

    #[tokio::test]
    async fn test_always_leader() {
        let mock = AlwaysLeader;
        assert!(mock.is_leader());
        assert!(mock.concede().await.unwrap());
        mock.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = Arc::new(MockStore::new());
        let election = Election::new(
            Arc::clone(&store) as Arc<dyn KvStore>,
            ElectionConfig::new("solo")
                .with_candidate("alice")
                .with_ttl_secs(1),
        )
        .await
        .unwrap();

        election.close().await;
        election.close().await;
        assert!(!election.is_leader());
    }
}
