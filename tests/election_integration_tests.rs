//! Integration tests for multi-candidate election behavior.
//!
//! These tests validate correct behavior across multiple candidates sharing
//! one (mock) store, including:
//! - A solo candidate electing itself
//! - Two candidates racing, with failover on close
//! - Conceding leadership while continuing to campaign
//! - Forced session termination and recovery
//! - Teardown deadlines while the store is partitioned
//! - Fatal watch errors (quorum loss) cascading into re-election
//! - Observer fan-out and terminal-event guarantees
//!
//! # Running these tests
//!
//! ```bash
//! cargo test --test election_integration_tests
//! ```
//!
//! These tests use the in-memory mock store and do not require external
//! services.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use ballot::{Election, ElectionConfig, Event, KvStore, LeaseId, MockStore};

// ============================================================================
// Test Harness
// ============================================================================

/// Installs a log subscriber honoring `RUST_LOG`, once per process.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a candidate in the named election, returning the election handle
/// and a channel carrying every event its observer receives (including the
/// initial one delivered during construction).
async fn join(
    store: &MockStore,
    election: &str,
    candidate: &str,
    ttl_secs: u64,
) -> (Election, mpsc::UnboundedReceiver<Event>) {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel();
    let election = Election::new(
        Arc::new(store.clone()) as Arc<dyn KvStore>,
        ElectionConfig::new(election)
            .with_candidate(candidate)
            .with_ttl_secs(ttl_secs)
            .with_event_observer(move |event| {
                let _ = tx.send(event);
            }),
    )
    .await
    .expect("election construction failed");
    (election, rx)
}

/// Receives the next event, failing the test after a generous deadline.
async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for election event")
        .expect("event channel closed")
}

/// Skips events until one matches the predicate.
async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Recovers the lease id encoded in a candidate key's hex suffix.
fn lease_from_key(key: &str, prefix: &str) -> LeaseId {
    let suffix = key.strip_prefix(prefix).expect("key outside prefix");
    LeaseId(i64::from_str_radix(suffix, 16).expect("non-hex key suffix"))
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_solo_election() {
    let store = MockStore::new();
    let (election, mut events) = join(&store, "presidental", "alice", 5).await;

    // The construction-releasing event announces us as leader.
    let event = next_event(&mut events).await;
    assert!(event.is_leader);
    assert!(!event.is_done);
    assert_eq!(event.leader_data, "alice");
    assert!(event.leader_key.starts_with("/elections/presidental"));
    assert!(election.is_leader());

    // The key is named after our lease and bound to it.
    let entries = store.keys_with_prefix("/elections/presidental").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, event.leader_key);
    let lease = lease_from_key(&event.leader_key, "/elections/presidental");
    assert!(store.lease_is_live(lease).await);

    election.close().await;
    assert!(!election.is_leader());
}

#[tokio::test]
async fn test_two_candidates_failover_on_close() {
    let store = MockStore::new();
    let (alice, mut alice_events) = join(&store, "race", "alice", 1).await;
    let (bob, mut bob_events) = join(&store, "race", "bob", 1).await;

    let alice_first = next_event(&mut alice_events).await;
    assert!(alice_first.is_leader);
    assert_eq!(alice_first.leader_data, "alice");

    let bob_first = next_event(&mut bob_events).await;
    assert!(!bob_first.is_leader);
    assert_eq!(bob_first.leader_data, "alice");
    assert!(!bob.is_leader());

    // The leader withdraws entirely; the follower takes over.
    alice.close().await;
    wait_for(&mut alice_events, |e| e.is_done).await;

    let elected = wait_for(&mut bob_events, |e| e.is_leader).await;
    assert_eq!(elected.leader_data, "bob");
    assert!(bob.is_leader());
    assert!(!alice.is_leader());

    bob.close().await;
}

#[tokio::test]
async fn test_concede_steps_down_and_keeps_campaigning() {
    let store = MockStore::new();
    let (alice, mut alice_events) = join(&store, "race", "alice", 1).await;
    let (bob, mut bob_events) = join(&store, "race", "bob", 1).await;

    assert!(next_event(&mut alice_events).await.is_leader);
    assert!(!next_event(&mut bob_events).await.is_leader);

    assert!(alice.concede().await.unwrap());

    let elected = wait_for(&mut bob_events, |e| e.is_leader).await;
    assert_eq!(elected.leader_data, "bob");

    // Alice re-registers under a new lease and observes bob as leader.
    let rejoined = wait_for(&mut alice_events, |e| {
        !e.is_leader && e.leader_data == "bob"
    })
    .await;
    assert!(rejoined.err.is_none());
    assert!(!alice.is_leader());

    // Her new key carries a strictly larger create revision than bob's.
    let entries = store.keys_with_prefix("/elections/race").await;
    assert_eq!(entries.len(), 2);
    let bob_revision = entries
        .iter()
        .find(|kv| kv.value == "bob")
        .unwrap()
        .create_revision;
    let alice_revision = entries
        .iter()
        .find(|kv| kv.value == "alice")
        .unwrap()
        .create_revision;
    assert!(alice_revision > bob_revision);

    // Conceding as a follower is a no-op.
    assert!(!alice.concede().await.unwrap());

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_solo_concede_reelects_self() {
    let store = MockStore::new();
    let (election, mut events) = join(&store, "solo", "alice", 1).await;

    let first = next_event(&mut events).await;
    assert!(first.is_leader);
    let first_revision = store
        .keys_with_prefix("/elections/solo")
        .await
        .first()
        .unwrap()
        .create_revision;

    assert!(election.concede().await.unwrap());

    // Still the only candidate: leadership comes back under a new key.
    let reelected = wait_for(&mut events, |e| e.is_leader).await;
    assert_ne!(reelected.leader_key, first.leader_key);
    let second_revision = store
        .keys_with_prefix("/elections/solo")
        .await
        .first()
        .unwrap()
        .create_revision;
    assert!(second_revision > first_revision);

    election.close().await;
}

#[tokio::test]
async fn test_forced_session_termination_elects_survivor() {
    let store = MockStore::new();
    let (alice, mut alice_events) = join(&store, "race", "alice", 1).await;
    let (bob, mut bob_events) = join(&store, "race", "bob", 1).await;

    let alice_first = next_event(&mut alice_events).await;
    assert!(alice_first.is_leader);
    assert!(!next_event(&mut bob_events).await.is_leader);

    // Kill alice's lease out-of-band, as the server would on missed
    // keepalives.
    let lease = lease_from_key(&alice_first.leader_key, "/elections/race");
    store.expire_lease(lease).await;

    let elected = wait_for(&mut bob_events, |e| e.is_leader).await;
    assert_eq!(elected.leader_data, "bob");

    // Alice steps down and, once her session recovers, rejoins as follower.
    wait_for(&mut alice_events, |e| !e.is_leader).await;
    assert!(!alice.is_leader());
    wait_for(&mut alice_events, |e| {
        !e.is_leader && e.leader_data == "bob" && e.err.is_none()
    })
    .await;

    // Both candidate keys are registered again.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        if store.keys_with_prefix("/elections/race").await.len() == 2 {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "alice never re-registered"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_close_during_partition_returns_within_ttl() {
    let store = MockStore::new();
    let (election, mut events) = join(&store, "solo", "alice", 1).await;
    assert!(next_event(&mut events).await.is_leader);

    store.set_stalled(true).await;

    let started = std::time::Instant::now();
    election.close().await;
    // Every teardown RPC is bounded by the TTL, so close cannot hang on the
    // partition.
    assert!(started.elapsed() < Duration::from_secs(4));

    wait_for(&mut events, |e| e.is_done).await;
    assert!(!election.is_leader());

    store.set_stalled(false).await;
}

// ============================================================================
// Fault recovery
// ============================================================================

#[tokio::test]
async fn test_quorum_loss_triggers_reelection() {
    let store = MockStore::new();
    let (election, mut events) = join(&store, "solo", "alice", 1).await;
    assert!(next_event(&mut events).await.is_leader);

    store.set_quorum(false).await;

    // The cancelled watch is fatal and reported.
    let failure = wait_for(&mut events, |e| e.err.is_some()).await;
    assert!(failure.err.unwrap().is_watch_canceled());

    store.set_quorum(true).await;

    wait_for(&mut events, |e| e.is_leader).await;
    // Give the recovered campaign a moment to settle, then confirm
    // leadership stuck.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(election.is_leader());

    election.close().await;
}

#[tokio::test]
async fn test_full_outage_and_recovery() {
    let store = MockStore::new();
    let (election, mut events) = join(&store, "solo", "alice", 1).await;
    assert!(next_event(&mut events).await.is_leader);

    store.set_reachable(false).await;

    // The lease is lost and the loss is reported.
    wait_for(&mut events, |e| e.err.is_some()).await;
    assert!(!election.is_leader());

    store.set_reachable(true).await;

    wait_for(&mut events, |e| e.is_leader).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(election.is_leader());

    election.close().await;
}

// ============================================================================
// Observer guarantees
// ============================================================================

#[tokio::test]
async fn test_every_observer_gets_exactly_one_terminal_event() {
    let store = MockStore::new();
    let (election, mut conf_events) = join(&store, "solo", "alice", 1).await;

    let (extra_tx, mut extra_events) = mpsc::unbounded_channel();
    election.add_observer("extra", move |event: Event| {
        let _ = extra_tx.send(event);
    });

    assert!(next_event(&mut conf_events).await.is_leader);

    election.close().await;
    // A second close must not produce a second terminal event.
    election.close().await;

    let mut conf_done = 0;
    while let Ok(event) = conf_events.try_recv() {
        if event.is_done {
            conf_done += 1;
        }
    }
    let mut extra_done = 0;
    while let Ok(event) = extra_events.try_recv() {
        if event.is_done {
            extra_done += 1;
        }
    }
    assert_eq!(conf_done, 1);
    assert_eq!(extra_done, 1);
}

#[tokio::test]
async fn test_removed_observer_stops_receiving() {
    let store = MockStore::new();
    let (election, mut conf_events) = join(&store, "solo", "alice", 1).await;
    assert!(next_event(&mut conf_events).await.is_leader);

    let (extra_tx, mut extra_events) = mpsc::unbounded_channel();
    election.add_observer("extra", move |event: Event| {
        let _ = extra_tx.send(event);
    });
    election.remove_observer("extra");

    election.close().await;

    wait_for(&mut conf_events, |e| e.is_done).await;
    assert!(extra_events.try_recv().is_err());
}

#[tokio::test]
async fn test_spurious_leader_events_are_suppressed() {
    let store = MockStore::new();
    let (alice, mut alice_events) = join(&store, "race", "alice", 1).await;
    assert!(next_event(&mut alice_events).await.is_leader);

    // A follower coming and going never changes the leader, so alice's
    // observers must stay quiet.
    let (bob, mut bob_events) = join(&store, "race", "bob", 1).await;
    assert!(!next_event(&mut bob_events).await.is_leader);
    bob.close().await;
    wait_for(&mut bob_events, |e| e.is_done).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(alice_events.try_recv().is_err());
    assert!(alice.is_leader());

    alice.close().await;
}
