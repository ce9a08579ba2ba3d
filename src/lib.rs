//! # Slackwater
//!
//! > *"Ride out the slack tide"*
//!
//! Resilience primitives for code that talks to flaky dependencies.
//!
//! ## Overview
//!
//! Three independent pieces that compose at the call site:
//!
//! - [`classify`]: turn a caught failure into a verdict (retry or not, how
//!   long to wait, whether to file an issue). Pure and deterministic.
//! - [`retry`]: re-run partially successful batch operations until their
//!   unprocessed remainder is empty, with jittered exponential backoff.
//! - [`breaker`]: stop calling a dependency that keeps failing, and try
//!   it again after a cooldown.
//!
//! None of them calls the others. A breaker does not retry, the retry loop
//! does not classify, and the classifier performs no I/O.
//!
//! ## Quick Example
//!
//! ```rust
//! use slackwater::{classify_error, BreakerConfig, BreakerError, CircuitBreaker};
//! use slackwater::{ClassifyOptions, ErrorDomain, Failure};
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::standalone(BreakerConfig::default().with_name("search-api"));
//!
//! let outcome = breaker
//!     .execute(|| async { Err::<(), _>("503 Service Unavailable") })
//!     .await;
//!
//! if let Err(BreakerError::Inner(message)) = outcome {
//!     let verdict = classify_error(
//!         &Failure::new(message),
//!         ErrorDomain::ExternalApi,
//!         &ClassifyOptions::new().with_service_name("Search"),
//!     );
//!     assert!(verdict.is_retryable());
//! }
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod breaker;
pub mod classify;
pub mod metrics;
pub mod retry;
pub mod testing;

// Re-exports
pub use breaker::{
    BreakerConfig, BreakerError, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitOpen,
    CircuitState,
};
pub use classify::{
    classify_error, Category, Classification, ClassifyOptions, ErrorDomain, Failure,
    IssuePriority,
};
pub use metrics::{MetricUnit, MetricsSink};
pub use retry::{
    calculate_delay_with_jitter, retry_unprocessed, retry_unprocessed_delete, BatchResult,
    DeleteResult, RetryConfig,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::breaker::{BreakerConfig, BreakerError, BreakerRegistry, CircuitBreaker};
    pub use crate::classify::{classify_error, Category, ClassifyOptions, ErrorDomain, Failure};
    pub use crate::retry::{retry_unprocessed, retry_unprocessed_delete, BatchResult, RetryConfig};
}
