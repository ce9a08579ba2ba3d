//! Circuit breakers for flaky dependencies.
//!
//! A [`CircuitBreaker`] wraps single calls to a dependency. After
//! `failure_threshold` consecutive failures it opens and rejects calls
//! without running them. Once `reset_timeout` has passed since the last
//! failure, the next call goes through as a half-open trial;
//! `success_threshold` trial successes close the circuit again, while a
//! single trial failure reopens it. Half-open never has more trials
//! finished-successfully or in flight than `success_threshold`; calls beyond
//! that are rejected with a zero `retry_after`.
//!
//! ```text
//!            failures >= threshold
//!   CLOSED ─────────────────────────▶ OPEN
//!     ▲                               │  ▲
//!     │ successes >= threshold        │  │ any failure
//!     │                 cooldown over ▼  │
//!     └─────────────────────────── HALF_OPEN
//! ```
//!
//! The breaker neither classifies nor retries. Pair it with
//! [`classify_error`](crate::classify::classify_error) when a caller needs
//! to decide what to do with the failure.
//!
//! # Example
//!
//! ```rust
//! use slackwater::breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let registry = BreakerRegistry::new();
//! let breaker = CircuitBreaker::new(
//!     BreakerConfig::default()
//!         .with_name("proxy-list")
//!         .with_failure_threshold(2)
//!         .with_reset_timeout(Duration::from_secs(30)),
//!     &registry,
//! );
//!
//! for _ in 0..2 {
//!     let _ = breaker.execute(|| async { Err::<(), _>("502 Bad Gateway") }).await;
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
//! assert!(rejected.unwrap_err().is_open());
//! # });
//! ```

mod error;
mod registry;
mod state;

pub use error::{BreakerError, CircuitOpen};
pub use registry::BreakerRegistry;
pub use state::{BreakerSnapshot, CircuitState};

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::metrics::{MetricUnit, MetricsSink, TracingMetrics};
use registry::lock;
use state::{Admission, Transition, TrialTicket};

/// Metric emitted on every state transition.
pub const METRIC_STATE_CHANGE: &str = "CircuitBreakerStateChange";
/// Metric emitted on every rejected call.
pub const METRIC_REJECTION: &str = "CircuitBreakerRejection";
/// Metric emitted on every recorded failure.
pub const METRIC_FAILURE: &str = "CircuitBreakerFailure";

/// Tuning for one breaker.
///
/// | field | default |
/// |---|---|
/// | `name` | `"default"` |
/// | `failure_threshold` | 5 |
/// | `reset_timeout` | 60s |
/// | `success_threshold` | 2 |
///
/// Thresholds below 1 are raised to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawBreakerConfig"))]
pub struct BreakerConfig {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(60_000),
            success_threshold: 2,
        }
    }
}

impl BreakerConfig {
    /// Preset for the YouTube media extractor.
    ///
    /// Extraction fails intermittently for reasons outside our control, so
    /// this tolerates more failures and cools down longer than the default.
    pub fn youtube() -> Self {
        Self::default()
            .with_name("youtube")
            .with_failure_threshold(10)
            .with_reset_timeout(Duration::from_millis(120_000))
    }

    /// Set the breaker name. Breakers sharing a registry and a name share state.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set how many consecutive failures open the circuit.
    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    /// Set how long an open circuit waits after the last failure before a trial call.
    pub fn with_reset_timeout(mut self, d: Duration) -> Self {
        self.reset_timeout = d;
        self
    }

    /// Set how many half-open successes close the circuit.
    pub fn with_success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n.max(1);
        self
    }

    /// Get the breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the failure threshold.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Get the reset timeout.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Get the success threshold.
    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(default)]
struct RawBreakerConfig {
    name: String,
    failure_threshold: u32,
    reset_timeout_ms: u64,
    success_threshold: u32,
}

#[cfg(feature = "serde")]
impl Default for RawBreakerConfig {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            name: defaults.name,
            failure_threshold: defaults.failure_threshold,
            reset_timeout_ms: defaults.reset_timeout.as_millis() as u64,
            success_threshold: defaults.success_threshold,
        }
    }
}

#[cfg(feature = "serde")]
impl From<RawBreakerConfig> for BreakerConfig {
    fn from(raw: RawBreakerConfig) -> Self {
        BreakerConfig::default()
            .with_name(raw.name)
            .with_failure_threshold(raw.failure_threshold)
            .with_reset_timeout(Duration::from_millis(raw.reset_timeout_ms))
            .with_success_threshold(raw.success_threshold)
    }
}

/// Guards calls to one named dependency.
///
/// Cheap to clone; clones share state. The state lock is only held for
/// bookkeeping, never while the guarded operation runs.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    entry: Arc<Mutex<BreakerSnapshot>>,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreaker {
    /// Create a breaker whose state lives in `registry` under `config.name()`.
    pub fn new(config: BreakerConfig, registry: &BreakerRegistry) -> Self {
        let entry = registry.entry(config.name());
        Self {
            config,
            entry,
            metrics: Arc::new(TracingMetrics),
        }
    }

    /// Create a breaker with private state, shared with no one but its clones.
    pub fn standalone(config: BreakerConfig) -> Self {
        Self::new(config, &BreakerRegistry::new())
    }

    /// The breaker for the YouTube media extractor. See [`BreakerConfig::youtube`].
    pub fn youtube(registry: &BreakerRegistry) -> Self {
        Self::new(BreakerConfig::youtube(), registry)
    }

    /// Send metrics to `sink` instead of the tracing-backed default.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`BreakerError::Open`] without running the operation while
    /// the circuit is open, or while it is half-open and every trial slot is
    /// taken. Otherwise runs it, records the outcome, and returns its value
    /// or its error (as [`BreakerError::Inner`]) unchanged.
    ///
    /// Dropping the returned future mid-trial frees the trial slot without
    /// recording an outcome.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = lock(&self.entry).admit(
            Instant::now(),
            self.config.reset_timeout,
            self.config.success_threshold,
        );
        let trial = match admission {
            Admission::Allowed { transition, trial } => {
                if let Some(transition) = transition {
                    self.report_transition(transition);
                }
                trial
            }
            Admission::Rejected { retry_after } => {
                tracing::warn!(
                    breaker = %self.config.name,
                    state = %self.state(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "circuit breaker rejected call"
                );
                self.metrics
                    .add_metric(METRIC_REJECTION, MetricUnit::Count, 1.0);
                return Err(BreakerError::Open(CircuitOpen {
                    name: self.config.name.clone(),
                    retry_after,
                }));
            }
        };

        let mut slot = TrialSlot {
            entry: &self.entry,
            trial,
        };
        let outcome = operation().await;
        let trial = slot.trial.take();

        match outcome {
            Ok(value) => {
                self.on_success(trial);
                Ok(value)
            }
            Err(error) => {
                self.on_failure(trial);
                Err(BreakerError::Inner(error))
            }
        }
    }

    fn on_success(&self, trial: Option<TrialTicket>) {
        let transition = lock(&self.entry).record_success(
            self.config.success_threshold,
            Instant::now(),
            trial,
        );
        if let Some(transition) = transition {
            self.report_transition(transition);
        }
    }

    fn on_failure(&self, trial: Option<TrialTicket>) {
        let (transition, failures) = {
            let mut snapshot = lock(&self.entry);
            let transition =
                snapshot.record_failure(self.config.failure_threshold, Instant::now(), trial);
            (transition, snapshot.failures)
        };

        tracing::debug!(breaker = %self.config.name, failures, "failure recorded");
        self.metrics.add_metric(METRIC_FAILURE, MetricUnit::Count, 1.0);
        if let Some(transition) = transition {
            self.report_transition(transition);
        }
    }

    fn report_transition(&self, transition: Transition) {
        tracing::info!(
            breaker = %self.config.name,
            from = %transition.from,
            to = %transition.to,
            "circuit breaker state changed"
        );
        self.metrics
            .add_metric(METRIC_STATE_CHANGE, MetricUnit::Count, 1.0);
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        lock(&self.entry).state
    }

    /// Failures currently counted toward opening the circuit.
    pub fn failure_count(&self) -> u32 {
        lock(&self.entry).failures
    }

    /// A copy of the full state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        lock(&self.entry).clone()
    }

    /// Force the circuit closed with zeroed counters.
    ///
    /// For administration and tests; the normal failure path never calls it.
    pub fn reset(&self) {
        let transition = lock(&self.entry).reset(Instant::now());
        if let Some(transition) = transition {
            self.report_transition(transition);
        }
    }

    /// The breaker name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The breaker's configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }
}

/// Holds a half-open trial slot while the guarded operation runs, and
/// gives it back if the call is cancelled before its outcome is recorded.
struct TrialSlot<'a> {
    entry: &'a Mutex<BreakerSnapshot>,
    trial: Option<TrialTicket>,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.trial.is_some() {
            lock(self.entry).release_trial(self.trial.take());
        }
    }
}
