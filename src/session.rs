//! Lease lifecycle management.
//!
//! A [`Session`] owns one lease on the store at a time and keeps it alive
//! from a dedicated task. Every lease transition is reported to a single
//! observer callback:
//!
//! - `(lease, None)` - a lease was acquired (initially or after a loss).
//! - `(LeaseId::NONE, Some(err))` - the lease was lost, or an acquisition
//!   attempt failed; re-acquisition continues with backoff.
//! - `(LeaseId::NONE, None)` - the lease was given up cleanly (reset or
//!   close).
//!
//! The observer is invoked serially, only from the session task, so
//! consumers never see two callbacks racing each other.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::backoff::BackoffCounter;
use crate::store::{KvStore, LeaseId, StoreError};

/// Default lease TTL in seconds.
pub const DEFAULT_TTL_SECS: u64 = 5;

/// Initial retry delay for lease acquisition.
const ACQUIRE_BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// Callback receiving lease transitions.
pub type SessionObserver = Arc<dyn Fn(LeaseId, Option<StoreError>) + Send + Sync>;

/// Configuration for a [`Session`].
pub struct SessionConfig {
    /// Lease TTL in seconds. Zero selects [`DEFAULT_TTL_SECS`].
    pub ttl_secs: u64,
    /// Receives every lease transition.
    pub observer: SessionObserver,
}

impl SessionConfig {
    /// Creates a configuration with the default TTL.
    pub fn new(observer: SessionObserver) -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            observer,
        }
    }

    /// Sets the lease TTL in seconds.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("ttl_secs", &self.ttl_secs)
            .field("observer", &"<callback>")
            .finish()
    }
}

enum Command {
    Reset(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

struct SessionInner {
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Current lease id, shared with the session task; zero while lost or
    /// closed.
    lease: Arc<AtomicI64>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
    ttl: Duration,
}

/// A lease on the store, kept alive in the background.
///
/// Cloning yields another handle on the same session. Callers must
/// [`close`](Session::close) the session when done; dropping all handles
/// revokes the lease best-effort but does not wait for it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Starts a session: spawns the task that acquires a lease of
    /// `config.ttl_secs` seconds and refreshes it at a third of the TTL.
    pub fn new(store: Arc<dyn KvStore>, config: SessionConfig) -> Self {
        let ttl_secs = if config.ttl_secs == 0 {
            DEFAULT_TTL_SECS
        } else {
            config.ttl_secs
        };
        let ttl = Duration::from_secs(ttl_secs);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let lease = Arc::new(AtomicI64::new(LeaseId::NONE.0));

        let task = tokio::spawn(run_session(
            store,
            ttl_secs,
            Arc::clone(&lease),
            config.observer,
            cmd_rx,
        ));

        let inner = Arc::new(SessionInner {
            cmd_tx,
            lease,
            task: std::sync::Mutex::new(Some(task)),
            ttl,
        });
        Self { inner }
    }

    /// The TTL this session was configured with.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// The current lease id, [`LeaseId::NONE`] while lost or closed.
    pub fn lease(&self) -> LeaseId {
        LeaseId(self.inner.lease.load(Ordering::Relaxed))
    }

    /// Forces a lease transition: the current lease is revoked, the observer
    /// sees `(NONE, None)`, and re-acquisition starts immediately. Returns
    /// after the observer has been invoked.
    pub async fn reset(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.cmd_tx.send(Command::Reset(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Revokes the lease, notifies the observer with `(NONE, None)`, stops
    /// the session task, and waits for it to finish. Idempotent.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.cmd_tx.send(Command::Close(tx)).is_ok() {
            let _ = rx.await;
        }
        let task = self.inner.task.lock().expect("session task lock").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("lease", &self.lease())
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

async fn run_session(
    store: Arc<dyn KvStore>,
    ttl_secs: u64,
    lease_cell: Arc<AtomicI64>,
    observer: SessionObserver,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let ttl = Duration::from_secs(ttl_secs);
    let refresh = ttl / 3;
    let mut backoff = BackoffCounter::new(ACQUIRE_BACKOFF_INITIAL, ttl, 2.0);

    'acquire: loop {
        // Acquire a lease, staying responsive to commands while we try.
        let lease = loop {
            tokio::select! {
                result = store.lease_grant(ttl_secs) => match result {
                    Ok(id) => break id,
                    Err(err) => {
                        warn!(error = %err, "lease grant failed");
                        observer(LeaseId::NONE, Some(err));
                        tokio::select! {
                            _ = sleep(backoff.next()) => {}
                            cmd = cmd_rx.recv() => match cmd {
                                Some(Command::Reset(ack)) => {
                                    let _ = ack.send(());
                                }
                                Some(Command::Close(ack)) => {
                                    let _ = ack.send(());
                                    return;
                                }
                                None => return,
                            }
                        }
                    }
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Reset(ack)) => {
                        let _ = ack.send(());
                    }
                    Some(Command::Close(ack)) => {
                        let _ = ack.send(());
                        return;
                    }
                    None => return,
                },
            }
        };
        backoff.reset();
        lease_cell.store(lease.0, Ordering::Relaxed);
        debug!(lease = %lease, ttl_secs, "lease acquired");
        observer(lease, None);

        let mut tick = interval(refresh);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // Bound each refresh so a stalled store cannot pin the
                    // task past its shutdown deadline.
                    let result = timeout(refresh, store.lease_keep_alive(lease)).await;
                    let err = match result {
                        Ok(Ok(())) => None,
                        Ok(Err(err)) => Some(err),
                        Err(_) => Some(StoreError::unavailable("keepalive timed out")),
                    };
                    if let Some(err) = err {
                        warn!(lease = %lease, error = %err, "lease lost");
                        lease_cell.store(LeaseId::NONE.0, Ordering::Relaxed);
                        observer(LeaseId::NONE, Some(err));
                        continue 'acquire;
                    }
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Reset(ack)) => {
                        let _ = timeout(ttl, store.lease_revoke(lease)).await;
                        lease_cell.store(LeaseId::NONE.0, Ordering::Relaxed);
                        debug!(lease = %lease, "session reset");
                        observer(LeaseId::NONE, None);
                        let _ = ack.send(());
                        continue 'acquire;
                    }
                    Some(Command::Close(ack)) => {
                        let _ = timeout(ttl, store.lease_revoke(lease)).await;
                        lease_cell.store(LeaseId::NONE.0, Ordering::Relaxed);
                        debug!(lease = %lease, "session closed");
                        observer(LeaseId::NONE, None);
                        let _ = ack.send(());
                        return;
                    }
                    None => {
                        let _ = timeout(ttl, store.lease_revoke(lease)).await;
                        return;
                    }
                }
            }
        }
    }
}
