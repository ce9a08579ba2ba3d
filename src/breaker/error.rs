//! Errors produced by [`CircuitBreaker::execute`](super::CircuitBreaker::execute).

use std::time::Duration;

/// A call the breaker refused to run.
///
/// This is the only error a breaker originates itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker '{name}' is open, retry after {retry_after:?}")]
pub struct CircuitOpen {
    /// Name of the breaker that rejected the call.
    pub name: String,
    /// Time left until the breaker will admit a trial call.
    pub retry_after: Duration,
}

/// Result error of a breaker-guarded call.
///
/// Either the breaker refused the call, or the call ran and failed with its
/// own error, which is passed through untouched.
///
/// # Examples
///
/// ```rust
/// use slackwater::breaker::{BreakerConfig, BreakerError, CircuitBreaker};
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::standalone(BreakerConfig::default());
///
/// let result = breaker.execute(|| async { Err::<(), _>("upstream 502") }).await;
///
/// match result {
///     Err(BreakerError::Inner(e)) => assert_eq!(e, "upstream 502"),
///     other => panic!("unexpected {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open, or half-open with every trial slot taken. The
    /// operation was not invoked.
    Open(CircuitOpen),
    /// The operation ran and failed.
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the breaker rejected the call.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Returns true if the operation itself failed.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the operation's error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Open(_) => None,
        }
    }

    /// How long to wait before calling again, when the circuit is open.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Open(open) => Some(open.retry_after),
            Self::Inner(_) => None,
        }
    }
}

impl<E> From<CircuitOpen> for BreakerError<E> {
    fn from(open: CircuitOpen) -> Self {
        Self::Open(open)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(open) => write!(f, "{}", open),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(_) => None,
            Self::Inner(e) => Some(e),
        }
    }
}
