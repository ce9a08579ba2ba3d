//! Testing utilities for code built on Slackwater.
//!
//! This module provides a recording metrics sink for asserting on breaker
//! observability, assertion macros for classifications, and (with the
//! `proptest` feature) `Arbitrary` implementations for the classifier's
//! input types.
//!
//! # Examples
//!
//! ## RecordingMetrics
//!
//! ```rust
//! use slackwater::breaker::{BreakerConfig, CircuitBreaker, METRIC_FAILURE};
//! use slackwater::testing::RecordingMetrics;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let metrics = RecordingMetrics::new();
//! let breaker = CircuitBreaker::standalone(BreakerConfig::default())
//!     .with_metrics(Arc::new(metrics.clone()));
//!
//! let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
//! assert_eq!(metrics.count(METRIC_FAILURE), 1);
//! # });
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use slackwater::classify::{classify_error, Category, ClassifyOptions, ErrorDomain, Failure};
//! use slackwater::{assert_category, assert_not_retryable};
//!
//! let verdict = classify_error(
//!     &Failure::new("jwt expired"),
//!     ErrorDomain::Auth,
//!     &ClassifyOptions::default(),
//! );
//! assert_category!(verdict, Category::AuthExpired);
//! assert_not_retryable!(verdict);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::metrics::{MetricUnit, MetricsSink};

/// A metric data point captured by [`RecordingMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    /// Metric name.
    pub name: String,
    /// Metric unit.
    pub unit: MetricUnit,
    /// Reported value.
    pub value: f64,
}

/// Metrics sink that keeps every data point in memory.
///
/// Clones share the same record, so keep one clone for assertions and hand
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetrics {
    records: Arc<Mutex<Vec<RecordedMetric>>>,
}

impl RecordingMetrics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All data points, in emission order.
    pub fn records(&self) -> Vec<RecordedMetric> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of values reported under `name`.
    pub fn count(&self, name: &str) -> u64 {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.value as u64)
            .sum()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MetricsSink for RecordingMetrics {
    fn add_metric(&self, name: &str, unit: MetricUnit, value: f64) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedMetric {
                name: name.to_string(),
                unit,
                value,
            });
    }
}

/// Assert that a classification has the expected category.
///
/// # Example
///
/// ```rust
/// use slackwater::classify::{classify_error, Category, ClassifyOptions, ErrorDomain};
/// use slackwater::assert_category;
///
/// let verdict = classify_error(&"502 Bad Gateway".into(), ErrorDomain::ExternalApi, &ClassifyOptions::default());
/// assert_category!(verdict, Category::Transient);
/// ```
#[macro_export]
macro_rules! assert_category {
    ($classification:expr, $category:expr) => {
        match &$classification {
            c if c.category() == $category => {}
            c => {
                panic!(
                    "Expected category {}, got {} ({})",
                    $category,
                    c.category(),
                    c.reason()
                );
            }
        }
    };
}

/// Assert that a classification allows retrying.
#[macro_export]
macro_rules! assert_retryable {
    ($classification:expr) => {
        match &$classification {
            c if c.is_retryable() => {}
            c => panic!("Expected retryable, got {} ({})", c.category(), c.reason()),
        }
    };
}

/// Assert that a classification forbids retrying.
#[macro_export]
macro_rules! assert_not_retryable {
    ($classification:expr) => {
        match &$classification {
            c if !c.is_retryable() => {}
            c => panic!(
                "Expected not retryable, got {} ({})",
                c.category(),
                c.reason()
            ),
        }
    };
}

#[cfg(feature = "proptest")]
use crate::classify::{Category, ErrorDomain, Failure};
#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl Arbitrary for ErrorDomain {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(ErrorDomain::Auth),
            Just(ErrorDomain::Database),
            Just(ErrorDomain::ExternalApi),
        ]
        .boxed()
    }
}

#[cfg(feature = "proptest")]
impl Arbitrary for Category {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Category::Transient),
            Just(Category::RateLimited),
            Just(Category::Permanent),
            Just(Category::AuthExpired),
            Just(Category::AuthInvalid),
        ]
        .boxed()
    }
}

#[cfg(feature = "proptest")]
impl Arbitrary for Failure {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Failure::empty()),
            ".{0,200}".prop_map(Failure::new),
            ("[a-z_]{1,12}::[A-Za-z]{1,20}", ".{0,200}")
                .prop_map(|(name, message)| Failure::named(name, message)),
        ]
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify_error, Category, ClassifyOptions, ErrorDomain, Failure};

    fn verdict(message: &str, domain: ErrorDomain) -> crate::classify::Classification {
        classify_error(&Failure::new(message), domain, &ClassifyOptions::default())
    }

    #[test]
    fn recording_metrics_counts_by_name() {
        let metrics = RecordingMetrics::new();
        metrics.add_metric("A", MetricUnit::Count, 1.0);
        metrics.add_metric("B", MetricUnit::Count, 1.0);
        metrics.add_metric("A", MetricUnit::Count, 2.0);

        assert_eq!(metrics.count("A"), 3);
        assert_eq!(metrics.count("B"), 1);
        assert_eq!(metrics.count("C"), 0);
        assert_eq!(metrics.records().len(), 3);
    }

    #[test]
    fn recording_metrics_clones_share_records() {
        let metrics = RecordingMetrics::new();
        let clone = metrics.clone();
        clone.add_metric("A", MetricUnit::Count, 1.0);

        assert_eq!(metrics.count("A"), 1);
        metrics.clear();
        assert!(clone.records().is_empty());
    }

    #[test]
    fn assert_category_macro() {
        assert_category!(verdict("jwt expired", ErrorDomain::Auth), Category::AuthExpired);
    }

    #[test]
    fn assert_retryable_macros() {
        assert_retryable!(verdict("deadlock detected", ErrorDomain::Database));
        assert_not_retryable!(verdict("404 not found", ErrorDomain::ExternalApi));
    }

    #[test]
    #[should_panic(expected = "Expected category")]
    fn assert_category_panics_on_mismatch() {
        assert_category!(verdict("jwt expired", ErrorDomain::Auth), Category::Transient);
    }

    #[test]
    #[should_panic(expected = "Expected retryable")]
    fn assert_retryable_panics_on_permanent() {
        assert_retryable!(verdict("duplicate key", ErrorDomain::Database));
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_failures_classify_in_every_domain(
                failure in any::<Failure>(),
                domain in any::<ErrorDomain>()
            ) {
                let verdict = classify_error(&failure, domain, &ClassifyOptions::default());
                prop_assert!(verdict.reason().chars().count() <= crate::classify::MAX_REASON_CHARS);
            }
        }
    }
}
