//! Shared bookkeeping for outstanding and resolved messages
//!
//! Every mutation happens under one mutex, which is what makes "first
//! resolver wins" hold between the dispatcher and the timer wheel. The lock
//! is only ever held for map/set updates, never across an await or I/O.

use crate::clock::SendStamp;
use crate::error::{AppError, Result};
use crate::types::OutcomeKind;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Result of an attempt to move an index into a terminal state
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// This caller won; the send metadata is handed over
    Resolved(SendStamp),
    /// Another path already resolved the index
    AlreadyResolved(OutcomeKind),
    /// The index was never registered by this run
    Unknown,
}

/// Outcome tallies for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    /// Messages registered for sending
    pub attempted: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
    /// Still waiting for an echo or a timer
    pub pending: usize,
    /// Echoes that arrived after their index was resolved
    pub late_echoes: usize,
}

impl RunCounts {
    /// Messages that reached a terminal state
    pub fn resolved(&self) -> usize {
        self.succeeded + self.timed_out + self.failed
    }

    /// Successful share of resolved messages, in percent
    pub fn success_rate(&self) -> f64 {
        let resolved = self.resolved();
        if resolved == 0 {
            0.0
        } else {
            self.succeeded as f64 / resolved as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    sent: HashSet<u32>,
    received: HashSet<u32>,
    timed_out: HashSet<u32>,
    failed: HashSet<u32>,
    pending: HashMap<u32, SendStamp>,
    resolved: HashMap<u32, OutcomeKind>,
    /// Resolved but not yet handed to the persistence queue
    in_flight: usize,
    late_echoes: usize,
}

/// Thread-safe registry of every message index in a run
#[derive(Debug, Default)]
pub struct OutcomeRegistry {
    state: Mutex<RegistryState>,
}

impl OutcomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic while holding the lock leaves plain collections behind,
        // which are still consistent enough to finish the run.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an outstanding send before it goes on the wire
    pub fn register_send(&self, index: u32, stamp: SendStamp) -> Result<()> {
        let mut state = self.lock();
        if state.pending.contains_key(&index) || state.resolved.contains_key(&index) {
            return Err(AppError::internal(format!("Message index {} registered twice", index)));
        }
        state.pending.insert(index, stamp);
        state.sent.insert(index);
        Ok(())
    }

    /// Atomically resolve a pending index; only the first caller wins
    ///
    /// A winning caller must follow up with [`OutcomeRegistry::mark_enqueued`]
    /// once the outcome has been handed on.
    pub fn try_resolve(&self, index: u32, kind: OutcomeKind) -> Resolution {
        let mut state = self.lock();

        if kind == OutcomeKind::Success && (state.sent.contains(&index) || state.resolved.contains_key(&index)) {
            state.received.insert(index);
        }

        if let Some(previous) = state.resolved.get(&index).copied() {
            if kind == OutcomeKind::Success {
                state.late_echoes += 1;
            }
            return Resolution::AlreadyResolved(previous);
        }

        let Some(stamp) = state.pending.remove(&index) else {
            return Resolution::Unknown;
        };

        match kind {
            OutcomeKind::Success => {}
            OutcomeKind::Timeout => {
                state.timed_out.insert(index);
                state.sent.remove(&index);
            }
            OutcomeKind::Failed => {
                state.failed.insert(index);
                state.sent.remove(&index);
            }
        }

        state.resolved.insert(index, kind);
        state.in_flight += 1;
        Resolution::Resolved(stamp)
    }

    /// Acknowledge that a resolved outcome reached the persistence queue;
    /// returns true when nothing is pending or in flight any more
    pub fn mark_enqueued(&self) -> bool {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.pending.is_empty() && state.in_flight == 0
    }

    /// True when every registered index is resolved and handed on
    pub fn is_settled(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.in_flight == 0
    }

    /// Run `arm` only if `index` is still pending, holding the lock so no
    /// resolver can slip in between the check and the arming
    ///
    /// `arm` must not block or touch the registry.
    pub fn arm_if_pending(&self, index: u32, arm: impl FnOnce()) -> bool {
        let state = self.lock();
        if !state.pending.contains_key(&index) {
            return false;
        }
        arm();
        true
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Terminal state of an index, if any
    pub fn outcome_of(&self, index: u32) -> Option<OutcomeKind> {
        self.lock().resolved.get(&index).copied()
    }

    /// Sent indices with no received echo, sorted
    pub fn unreceived(&self) -> Vec<u32> {
        let state = self.lock();
        let missing: BTreeSet<u32> = state.sent.difference(&state.received).copied().collect();
        missing.into_iter().collect()
    }

    /// Snapshot of the run tallies
    pub fn counts(&self) -> RunCounts {
        let state = self.lock();
        let mut counts = RunCounts {
            attempted: state.pending.len() + state.resolved.len(),
            pending: state.pending.len(),
            late_echoes: state.late_echoes,
            ..RunCounts::default()
        };

        for kind in state.resolved.values() {
            match kind {
                OutcomeKind::Success => counts.succeeded += 1,
                OutcomeKind::Timeout => counts.timed_out += 1,
                OutcomeKind::Failed => counts.failed += 1,
            }
        }

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn stamp(monotonic: f64) -> SendStamp {
        SendStamp {
            wall_clock: "2024-01-01T00:00:00.000+00:00".to_string(),
            monotonic,
        }
    }

    #[test]
    fn test_first_resolver_wins() {
        let registry = OutcomeRegistry::new();
        registry.register_send(1, stamp(1.0)).unwrap();

        assert_eq!(registry.try_resolve(1, OutcomeKind::Success), Resolution::Resolved(stamp(1.0)));
        assert_eq!(
            registry.try_resolve(1, OutcomeKind::Timeout),
            Resolution::AlreadyResolved(OutcomeKind::Success)
        );
        assert_eq!(registry.outcome_of(1), Some(OutcomeKind::Success));
    }

    #[test]
    fn test_echo_after_timeout_is_late() {
        let registry = OutcomeRegistry::new();
        registry.register_send(3, stamp(1.0)).unwrap();

        assert!(matches!(registry.try_resolve(3, OutcomeKind::Timeout), Resolution::Resolved(_)));
        assert_eq!(
            registry.try_resolve(3, OutcomeKind::Success),
            Resolution::AlreadyResolved(OutcomeKind::Timeout)
        );

        let counts = registry.counts();
        assert_eq!(counts.timed_out, 1);
        assert_eq!(counts.succeeded, 0);
        assert_eq!(counts.late_echoes, 1);
    }

    #[test]
    fn test_unknown_index() {
        let registry = OutcomeRegistry::new();
        assert_eq!(registry.try_resolve(42, OutcomeKind::Success), Resolution::Unknown);
        assert!(registry.unreceived().is_empty());
    }

    #[test]
    fn test_double_registration_rejected() {
        let registry = OutcomeRegistry::new();
        registry.register_send(1, stamp(0.0)).unwrap();
        assert!(registry.register_send(1, stamp(0.0)).is_err());
    }

    #[test]
    fn test_unreceived_is_sorted_pending_set() {
        let registry = OutcomeRegistry::new();
        for index in [5, 2, 9, 1] {
            registry.register_send(index, stamp(0.0)).unwrap();
        }
        registry.try_resolve(2, OutcomeKind::Success);
        registry.try_resolve(9, OutcomeKind::Failed);

        assert_eq!(registry.unreceived(), vec![1, 5]);
    }

    #[test]
    fn test_settled_waits_for_in_flight() {
        let registry = OutcomeRegistry::new();
        registry.register_send(1, stamp(0.0)).unwrap();
        assert!(!registry.is_settled());

        registry.try_resolve(1, OutcomeKind::Success);
        assert_eq!(registry.pending_count(), 0);
        assert!(!registry.is_settled());

        assert!(registry.mark_enqueued());
        assert!(registry.is_settled());
    }

    #[test]
    fn test_arm_only_while_pending() {
        let registry = OutcomeRegistry::new();
        registry.register_send(1, stamp(0.0)).unwrap();
        registry.register_send(2, stamp(0.0)).unwrap();
        registry.try_resolve(2, OutcomeKind::Success);

        let mut armed = Vec::new();
        assert!(registry.arm_if_pending(1, || armed.push(1)));
        assert!(!registry.arm_if_pending(2, || armed.push(2)));
        assert!(!registry.arm_if_pending(7, || armed.push(7)));
        assert_eq!(armed, vec![1]);
    }

    #[test]
    fn test_arming_and_resolving_are_serialized() {
        // Whoever takes the lock first decides: either the timer is armed
        // before the echo resolves, or it is never armed at all
        for _ in 0..50 {
            let registry = Arc::new(OutcomeRegistry::new());
            registry.register_send(1, stamp(0.0)).unwrap();
            let events = Arc::new(Mutex::new(Vec::new()));

            let resolver = {
                let registry = Arc::clone(&registry);
                let events = Arc::clone(&events);
                std::thread::spawn(move || {
                    if let Resolution::Resolved(_) = registry.try_resolve(1, OutcomeKind::Success) {
                        events.lock().unwrap().push("resolved");
                    }
                })
            };
            let armed = registry.arm_if_pending(1, || events.lock().unwrap().push("armed"));
            resolver.join().unwrap();

            let events = events.lock().unwrap();
            if armed {
                assert_eq!(*events, vec!["armed", "resolved"]);
            } else {
                assert_eq!(*events, vec!["resolved"]);
            }
        }
    }

    #[test]
    fn test_concurrent_resolvers_single_winner() {
        for _ in 0..50 {
            let registry = Arc::new(OutcomeRegistry::new());
            registry.register_send(1, stamp(0.0)).unwrap();

            let handles: Vec<_> = [OutcomeKind::Success, OutcomeKind::Timeout, OutcomeKind::Success]
                .into_iter()
                .map(|kind| {
                    let registry = Arc::clone(&registry);
                    std::thread::spawn(move || registry.try_resolve(1, kind))
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| matches!(r, Resolution::Resolved(_)))
                .count();
            assert_eq!(winners, 1);
        }
    }

    fn kind_strategy() -> impl Strategy<Value = OutcomeKind> {
        prop_oneof![
            Just(OutcomeKind::Success),
            Just(OutcomeKind::Timeout),
            Just(OutcomeKind::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_each_index_resolves_exactly_once(
            count in 1u32..40,
            events in proptest::collection::vec((0u32..40, kind_strategy()), 0..200),
        ) {
            let registry = OutcomeRegistry::new();
            for index in 1..=count {
                registry.register_send(index, stamp(index as f64)).unwrap();
            }

            let mut wins: HashMap<u32, usize> = HashMap::new();
            for (index, kind) in events {
                if let Resolution::Resolved(stamp) = registry.try_resolve(index, kind) {
                    prop_assert_eq!(stamp.monotonic, index as f64);
                    *wins.entry(index).or_default() += 1;
                    registry.mark_enqueued();
                }
            }

            for hits in wins.values() {
                prop_assert_eq!(*hits, 1);
            }

            let counts = registry.counts();
            prop_assert_eq!(counts.attempted, count as usize);
            prop_assert_eq!(counts.resolved() + counts.pending, count as usize);
            prop_assert_eq!(registry.unreceived().len(), counts.pending);
        }
    }
}
