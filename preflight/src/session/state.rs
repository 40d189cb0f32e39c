//! Per-resource bookkeeping for a load session.
//!
//! One [`SessionState`] lives behind the engine's mutex. It owns the
//! per-resource lifecycle states, the lazily-created retry ledger, the
//! validator and callback registries, and the completion counters. All
//! methods are plain state transitions; the engine decides what to do with
//! their results and runs user closures outside the lock.

use std::collections::HashMap;

use crate::manifest::{LoadedCallback, ResourceKey, Validator};

/// Lifecycle of a single resource within a session.
///
/// `Succeeded` and `FailedPermanently` are terminal: once reached, further
/// completion reports for the key are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Waiting for the loader to report completion (possibly on a retry).
    Pending,
    /// Confirmed loaded; the progress event and callbacks have fired.
    Succeeded,
    /// Retry budget exhausted; the resource will never finalize.
    FailedPermanently,
}

impl ResourceState {
    /// Returns `true` for states that admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Succeeded | ResourceState::FailedPermanently)
    }
}

/// Point-in-time view of a session's counters.
///
/// Taken under the engine lock and returned by value, so observers can poll
/// it freely without blocking progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    /// Total resources in the manifest.
    pub total: usize,
    /// Resources confirmed loaded.
    pub succeeded: usize,
    /// Resources that exhausted their retry budget.
    pub failed: usize,
    /// Resources still pending (including those awaiting a retry).
    pub pending: usize,
    /// `succeeded / total`; reads 1.0 for an empty manifest.
    pub percent: f64,
}

/// Everything a finalized resource needs fired outside the lock.
pub(crate) struct FinalizeOutcome {
    pub succeeded: usize,
    pub total: usize,
    pub callbacks: Vec<LoadedCallback>,
}

/// Mutable session bookkeeping, owned by the engine's mutex.
pub(crate) struct SessionState {
    states: HashMap<ResourceKey, ResourceState>,
    attempts: HashMap<ResourceKey, u32>,
    validators: HashMap<ResourceKey, Validator>,
    callbacks: HashMap<ResourceKey, Vec<LoadedCallback>>,
    succeeded: usize,
    failed: usize,
    total: usize,
}

impl SessionState {
    pub(crate) fn new(
        keys: impl IntoIterator<Item = ResourceKey>,
        validators: HashMap<ResourceKey, Validator>,
        callbacks: HashMap<ResourceKey, Vec<LoadedCallback>>,
    ) -> Self {
        let states: HashMap<_, _> = keys
            .into_iter()
            .map(|key| (key, ResourceState::Pending))
            .collect();
        let total = states.len();
        Self {
            states,
            attempts: HashMap::new(),
            validators,
            callbacks,
            succeeded: 0,
            failed: 0,
            total,
        }
    }

    /// Returns `true` if the key is known and not yet settled.
    pub(crate) fn is_pending(&self, key: &ResourceKey) -> bool {
        self.states.get(key) == Some(&ResourceState::Pending)
    }

    /// Returns the lifecycle state of `key`, or `None` for unknown keys.
    pub(crate) fn state_of(&self, key: &ResourceKey) -> Option<ResourceState> {
        self.states.get(key).copied()
    }

    /// Returns the validator registered for `key`, if any.
    pub(crate) fn validator(&self, key: &ResourceKey) -> Option<Validator> {
        self.validators.get(key).cloned()
    }

    /// Transitions `key` to `Succeeded` and drains its callbacks.
    ///
    /// Returns `None` if the key is unknown or already settled, so a racing
    /// duplicate completion cannot double-count.
    pub(crate) fn record_success(&mut self, key: &ResourceKey) -> Option<FinalizeOutcome> {
        if !self.is_pending(key) {
            return None;
        }
        self.states.insert(key.clone(), ResourceState::Succeeded);
        self.succeeded += 1;
        Some(FinalizeOutcome {
            succeeded: self.succeeded,
            total: self.total,
            callbacks: self.callbacks.remove(key).unwrap_or_default(),
        })
    }

    /// Increments the retry ledger for `key` and returns the new count.
    ///
    /// The counter is created lazily on first failure and never reset.
    /// Returns `None` if the key is unknown or already settled.
    pub(crate) fn record_attempt(&mut self, key: &ResourceKey) -> Option<u32> {
        if !self.is_pending(key) {
            return None;
        }
        let attempts = self.attempts.entry(key.clone()).or_insert(0);
        *attempts += 1;
        Some(*attempts)
    }

    /// Transitions `key` to `FailedPermanently`.
    pub(crate) fn record_permanent_failure(&mut self, key: &ResourceKey) {
        if !self.is_pending(key) {
            return;
        }
        self.states.insert(key.clone(), ResourceState::FailedPermanently);
        self.failed += 1;
    }

    /// Returns `true` once every resource has reached a terminal state.
    pub(crate) fn settled(&self) -> bool {
        self.succeeded + self.failed == self.total
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let percent = if self.total == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.total as f64
        };
        SessionSnapshot {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            pending: self.total - self.succeeded - self.failed,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(names: &[&str]) -> Vec<ResourceKey> {
        names.iter().map(|name| ResourceKey::new(*name)).collect()
    }

    fn state_for(names: &[&str]) -> SessionState {
        SessionState::new(keys(names), HashMap::new(), HashMap::new())
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ResourceState::Pending.is_terminal());
        assert!(ResourceState::Succeeded.is_terminal());
        assert!(ResourceState::FailedPermanently.is_terminal());
    }

    #[test]
    fn test_record_success_counts_once() {
        let mut state = state_for(&["a.js", "b.js"]);
        let key = ResourceKey::new("a.js");

        let outcome = state.record_success(&key).expect("first success");
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.total, 2);

        // A duplicate completion report is absorbed by the terminal state.
        assert!(state.record_success(&key).is_none());
        assert_eq!(state.snapshot().succeeded, 1);
    }

    #[test]
    fn test_record_success_rejects_unknown_keys() {
        let mut state = state_for(&["a.js"]);
        assert!(state.record_success(&ResourceKey::new("nope.js")).is_none());
    }

    #[test]
    fn test_attempt_ledger_is_per_key() {
        let mut state = state_for(&["x.js", "y.js"]);
        let x = ResourceKey::new("x.js");
        let y = ResourceKey::new("y.js");

        assert_eq!(state.record_attempt(&x), Some(1));
        assert_eq!(state.record_attempt(&x), Some(2));
        assert_eq!(state.record_attempt(&y), Some(1));
    }

    #[test]
    fn test_permanent_failure_settles_the_key() {
        let mut state = state_for(&["a.js"]);
        let key = ResourceKey::new("a.js");

        state.record_permanent_failure(&key);
        assert!(!state.is_pending(&key));
        assert!(state.record_attempt(&key).is_none());
        assert!(state.settled());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.pending, 0);
    }

    #[test]
    fn test_empty_session_is_settled_at_full_percent() {
        let state = state_for(&[]);
        assert!(state.settled());
        assert_eq!(state.snapshot().percent, 1.0);
    }

    #[test]
    fn test_snapshot_percent() {
        let mut state = state_for(&["a", "b", "c", "d"]);
        state.record_success(&ResourceKey::new("a"));
        state.record_success(&ResourceKey::new("b"));
        assert_eq!(state.snapshot().percent, 0.5);
    }

    proptest! {
        /// Percent is monotone non-decreasing under any success order and
        /// always equals succeeded / total.
        #[test]
        fn prop_percent_is_monotone(total in 1usize..32, successes in proptest::collection::vec(0usize..32, 0..64)) {
            let names: Vec<String> = (0..total).map(|i| format!("res-{i}")).collect();
            let mut state = SessionState::new(
                names.iter().map(ResourceKey::new),
                HashMap::new(),
                HashMap::new(),
            );

            let mut last_percent = 0.0f64;
            for index in successes {
                let key = ResourceKey::new(&names[index % total]);
                if let Some(outcome) = state.record_success(&key) {
                    let percent = outcome.succeeded as f64 / outcome.total as f64;
                    prop_assert!(percent >= last_percent);
                    prop_assert_eq!(percent, state.snapshot().percent);
                    last_percent = percent;
                }
            }
        }
    }
}
