//! Counter-style metrics emitted by the resilience primitives.
//!
//! The breaker reports every state change, rejection and recorded failure
//! through a [`MetricsSink`]. Emission is fire-and-forget: a sink must not
//! panic, block, or feed anything back into control flow.
//!
//! # Example
//!
//! ```rust
//! use slackwater::metrics::{MetricUnit, MetricsSink, TracingMetrics};
//!
//! let sink = TracingMetrics;
//! sink.add_metric("CircuitBreakerRejection", MetricUnit::Count, 1.0);
//! ```

use std::fmt;

/// Unit attached to an emitted metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetricUnit {
    /// A plain occurrence count.
    Count,
}

impl MetricUnit {
    /// The unit name as reported to metric backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "Count",
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for counter-style observability events.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// Record a single data point.
    fn add_metric(&self, name: &str, unit: MetricUnit, value: f64);
}

/// Default sink: writes each data point as a `tracing` event.
///
/// Events go to the `slackwater::metrics` target at debug level, so a
/// subscriber can route them to an embedded-metric log format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn add_metric(&self, name: &str, unit: MetricUnit, value: f64) {
        tracing::debug!(target: "slackwater::metrics", metric = name, unit = %unit, value);
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn add_metric(&self, _name: &str, _unit: MetricUnit, _value: f64) {}
}
