//! The breaker state machine, free of locking, logging and metrics.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// Trial calls test whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    /// The state's log/metric name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a breaker remembers about one named dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Failures counted toward opening the circuit.
    pub failures: u32,
    /// Successes counted toward closing a half-open circuit.
    pub successes: u32,
    /// When the most recent failure was recorded.
    pub last_failure_time: Option<Instant>,
    /// When the state last changed (or the entry was created).
    pub last_state_change: Instant,
    /// Half-open trial calls admitted and not yet finished.
    pub in_flight_trials: u32,
    /// Bumped on every entry into half-open, so a trial admitted in an
    /// earlier half-open period cannot release a slot in a later one.
    trial_epoch: u64,
}

/// A state change, reported for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// Identifies an admitted half-open trial until its outcome is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrialTicket(u64);

/// Whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Allowed {
        transition: Option<Transition>,
        trial: Option<TrialTicket>,
    },
    Rejected {
        retry_after: Duration,
    },
}

impl BreakerSnapshot {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure_time: None,
            last_state_change: now,
            in_flight_trials: 0,
            trial_epoch: 0,
        }
    }

    /// Decide on a call. An open circuit whose cooldown has elapsed moves to
    /// half-open and admits this same call as its first trial.
    ///
    /// Half-open admits a call only while finished successes plus trials in
    /// flight stay below `success_threshold`; the rest are rejected with a
    /// zero retry hint.
    pub(crate) fn admit(
        &mut self,
        now: Instant,
        reset_timeout: Duration,
        success_threshold: u32,
    ) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed {
                transition: None,
                trial: None,
            },
            CircuitState::HalfOpen => self.admit_trial(success_threshold, None),
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_time
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);

                if elapsed >= reset_timeout {
                    self.successes = 0;
                    self.trial_epoch = self.trial_epoch.wrapping_add(1);
                    let transition = self.move_to(CircuitState::HalfOpen, now);
                    self.admit_trial(success_threshold, Some(transition))
                } else {
                    Admission::Rejected {
                        retry_after: reset_timeout - elapsed,
                    }
                }
            }
        }
    }

    fn admit_trial(&mut self, success_threshold: u32, transition: Option<Transition>) -> Admission {
        if self.in_flight_trials.saturating_add(self.successes) < success_threshold {
            self.in_flight_trials += 1;
            Admission::Allowed {
                transition,
                trial: Some(TrialTicket(self.trial_epoch)),
            }
        } else {
            Admission::Rejected {
                retry_after: Duration::ZERO,
            }
        }
    }

    /// Free the slot held by `trial`. Tickets from an earlier half-open
    /// period, or arriving after the circuit left half-open, free nothing.
    pub(crate) fn release_trial(&mut self, trial: Option<TrialTicket>) {
        if let Some(TrialTicket(epoch)) = trial {
            if self.state == CircuitState::HalfOpen && epoch == self.trial_epoch {
                self.in_flight_trials = self.in_flight_trials.saturating_sub(1);
            }
        }
    }

    pub(crate) fn record_success(
        &mut self,
        success_threshold: u32,
        now: Instant,
        trial: Option<TrialTicket>,
    ) -> Option<Transition> {
        self.release_trial(trial);
        match self.state {
            CircuitState::Closed => {
                self.failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                self.successes += 1;
                if self.successes >= success_threshold {
                    self.failures = 0;
                    self.successes = 0;
                    Some(self.move_to(CircuitState::Closed, now))
                } else {
                    None
                }
            }
            // A call admitted before the circuit reopened; it proves nothing.
            CircuitState::Open => None,
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        failure_threshold: u32,
        now: Instant,
        trial: Option<TrialTicket>,
    ) -> Option<Transition> {
        self.release_trial(trial);
        self.failures = self.failures.saturating_add(1);
        self.last_failure_time = Some(now);

        match self.state {
            CircuitState::Closed if self.failures >= failure_threshold => {
                Some(self.move_to(CircuitState::Open, now))
            }
            CircuitState::Closed | CircuitState::Open => None,
            CircuitState::HalfOpen => {
                self.successes = 0;
                Some(self.move_to(CircuitState::Open, now))
            }
        }
    }

    pub(crate) fn reset(&mut self, now: Instant) -> Option<Transition> {
        self.failures = 0;
        self.successes = 0;
        self.last_failure_time = None;
        if self.state == CircuitState::Closed {
            None
        } else {
            Some(self.move_to(CircuitState::Closed, now))
        }
    }

    fn move_to(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.last_state_change = now;
        self.in_flight_trials = 0;
        Transition { from, to }
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(60);

    fn open_snapshot(at: Instant) -> BreakerSnapshot {
        let mut snapshot = BreakerSnapshot::new(at);
        for _ in 0..3 {
            snapshot.record_failure(3, at, None);
        }
        assert_eq!(snapshot.state, CircuitState::Open);
        snapshot
    }

    fn ticket(admission: Admission) -> Option<TrialTicket> {
        match admission {
            Admission::Allowed { trial, .. } => trial,
            Admission::Rejected { retry_after } => panic!("rejected, retry after {:?}", retry_after),
        }
    }

    #[test]
    fn test_new_is_closed_with_zero_counters() {
        let snapshot = BreakerSnapshot::new(Instant::now());
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.in_flight_trials, 0);
        assert_eq!(snapshot.last_failure_time, None);
    }

    #[test]
    fn test_closed_admits_without_ticket() {
        let now = Instant::now();
        let mut snapshot = BreakerSnapshot::new(now);
        assert_eq!(
            snapshot.admit(now, RESET, 2),
            Admission::Allowed {
                transition: None,
                trial: None
            }
        );
    }

    #[test]
    fn test_failures_open_at_threshold() {
        let now = Instant::now();
        let mut snapshot = BreakerSnapshot::new(now);

        assert_eq!(snapshot.record_failure(3, now, None), None);
        assert_eq!(snapshot.record_failure(3, now, None), None);
        assert_eq!(
            snapshot.record_failure(3, now, None),
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
    }

    #[test]
    fn test_success_in_closed_clears_failures() {
        let now = Instant::now();
        let mut snapshot = BreakerSnapshot::new(now);
        snapshot.record_failure(5, now, None);
        snapshot.record_failure(5, now, None);

        assert_eq!(snapshot.record_success(2, now, None), None);
        assert_eq!(snapshot.failures, 0);
    }

    #[test]
    fn test_open_rejects_with_remaining_cooldown() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);

        let later = now + Duration::from_secs(15);
        assert_eq!(
            snapshot.admit(later, RESET, 2),
            Admission::Rejected {
                retry_after: Duration::from_secs(45)
            }
        );
        assert_eq!(snapshot.state, CircuitState::Open);
    }

    #[test]
    fn test_elapsed_cooldown_admits_as_half_open() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);

        match snapshot.admit(now + RESET, RESET, 2) {
            Admission::Allowed { transition, trial } => {
                assert_eq!(
                    transition,
                    Some(Transition {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen
                    })
                );
                assert!(trial.is_some());
            }
            other => panic!("expected admission, got {:?}", other),
        }
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.in_flight_trials, 1);
    }

    #[test]
    fn test_half_open_admits_at_most_success_threshold_trials() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let trial_time = now + RESET;

        let first = ticket(snapshot.admit(trial_time, RESET, 2));
        let _second = ticket(snapshot.admit(trial_time, RESET, 2));
        assert_eq!(
            snapshot.admit(trial_time, RESET, 2),
            Admission::Rejected {
                retry_after: Duration::ZERO
            }
        );
        assert_eq!(snapshot.in_flight_trials, 2);

        // A finished success still counts toward the budget.
        snapshot.record_success(2, trial_time, first);
        assert_eq!(snapshot.in_flight_trials, 1);
        assert!(matches!(
            snapshot.admit(trial_time, RESET, 2),
            Admission::Rejected { .. }
        ));
    }

    #[test]
    fn test_released_trial_frees_a_slot() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let trial_time = now + RESET;

        let only = ticket(snapshot.admit(trial_time, RESET, 1));
        assert!(matches!(
            snapshot.admit(trial_time, RESET, 1),
            Admission::Rejected { .. }
        ));

        snapshot.release_trial(only);
        assert_eq!(snapshot.in_flight_trials, 0);
        assert!(ticket(snapshot.admit(trial_time, RESET, 1)).is_some());
    }

    #[test]
    fn test_stale_ticket_frees_nothing_in_later_half_open() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let first_trial = now + RESET;

        let stale = ticket(snapshot.admit(first_trial, RESET, 2));
        let failing = ticket(snapshot.admit(first_trial, RESET, 2));
        snapshot.record_failure(3, first_trial, failing);
        assert_eq!(snapshot.state, CircuitState::Open);

        let second_trial = first_trial + RESET;
        let _current = ticket(snapshot.admit(second_trial, RESET, 2));
        assert_eq!(snapshot.in_flight_trials, 1);

        snapshot.release_trial(stale);
        assert_eq!(snapshot.in_flight_trials, 1);
    }

    #[test]
    fn test_half_open_closes_after_success_threshold() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let trial_time = now + RESET;
        let a = ticket(snapshot.admit(trial_time, RESET, 2));
        let b = ticket(snapshot.admit(trial_time, RESET, 2));

        assert_eq!(snapshot.record_success(2, trial_time, a), None);
        assert!(snapshot.record_success(2, trial_time, b).is_some());
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 0);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.in_flight_trials, 0);
    }

    #[test]
    fn test_half_open_failure_reopens_regardless_of_successes() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let trial_time = now + RESET;
        for _ in 0..2 {
            let trial = ticket(snapshot.admit(trial_time, RESET, 3));
            snapshot.record_success(3, trial_time, trial);
        }
        let trial = ticket(snapshot.admit(trial_time, RESET, 3));

        let transition = snapshot.record_failure(100, trial_time, trial);
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Open
            })
        );
        assert_eq!(snapshot.last_failure_time, Some(trial_time));
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.in_flight_trials, 0);
    }

    #[test]
    fn test_failure_while_open_refreshes_cooldown() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);
        let later = now + Duration::from_secs(30);

        assert_eq!(snapshot.record_failure(3, later, None), None);
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.last_failure_time, Some(later));
    }

    #[test]
    fn test_reset_returns_to_closed() {
        let now = Instant::now();
        let mut snapshot = open_snapshot(now);

        assert!(snapshot.reset(now).is_some());
        assert_eq!(snapshot, BreakerSnapshot::new(now));
        assert_eq!(snapshot.reset(now), None);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
    }
}
