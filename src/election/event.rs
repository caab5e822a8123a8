//! Leadership events delivered to observers.

use std::sync::Arc;

use crate::store::KeyValue;

use super::error::ElectionError;

/// A leadership notification.
///
/// Observers receive one event per leader-identity transition (spurious
/// repeats of the same leader are suppressed), one event per error, and a
/// single terminal event with `is_done` set after the election is closed.
/// `err` does not imply `is_done`: transient errors are followed by more
/// events once the election recovers.
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// Whether *this* candidate is currently leader.
    pub is_leader: bool,
    /// Set on the final event; nothing follows it.
    pub is_done: bool,
    /// The current leader's key; empty when unknown.
    pub leader_key: String,
    /// The current leader's value (its candidate name); empty when unknown.
    pub leader_data: String,
    /// An error encountered while participating in the election.
    pub err: Option<ElectionError>,
}

impl Event {
    /// A leader-change notification.
    pub(crate) fn leader_change(kv: &KeyValue, is_leader: bool) -> Self {
        Self {
            is_leader,
            leader_key: kv.key.clone(),
            leader_data: kv.value.clone(),
            ..Self::default()
        }
    }

    /// An error notification.
    pub(crate) fn error(err: ElectionError) -> Self {
        Self {
            err: Some(err),
            ..Self::default()
        }
    }

    /// The terminal notification.
    pub(crate) fn done() -> Self {
        Self {
            is_done: true,
            ..Self::default()
        }
    }
}

/// Callback receiving election [`Event`]s.
///
/// Observers are registered under stable string ids and invoked strictly
/// serially: no two callbacks execute concurrently, and event order matches
/// the order of underlying store changes with the synthetic initial and
/// terminal events bracketing them.
pub type EventObserver = Arc<dyn Fn(Event) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_change_event() {
        let kv = KeyValue {
            key: "/elections/demo1a".to_string(),
            value: "alice".to_string(),
            create_revision: 3,
        };
        let event = Event::leader_change(&kv, true);
        assert!(event.is_leader);
        assert!(!event.is_done);
        assert_eq!(event.leader_key, "/elections/demo1a");
        assert_eq!(event.leader_data, "alice");
        assert!(event.err.is_none());
    }

    #[test]
    fn test_error_event_is_not_terminal() {
        let event = Event::error(ElectionError::WatchCanceled);
        assert!(!event.is_done);
        assert!(event.err.is_some());
    }

    #[test]
    fn test_done_event() {
        let event = Event::done();
        assert!(event.is_done);
        assert!(!event.is_leader);
        assert!(event.leader_key.is_empty());
    }
}
