//! Retrying the unprocessed remainder of batch operations.
//!
//! Batch APIs (bulk writes, bulk deletes, multi-message sends) often succeed
//! partially and report the items they could not complete. The functions
//! here re-run such an operation until nothing is left unprocessed or the
//! retry budget runs out, sleeping with jittered exponential backoff between
//! attempts.
//!
//! # Quick Start
//!
//! ```rust
//! use slackwater::retry::{retry_unprocessed, BatchResult, RetryConfig};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let calls = Arc::new(AtomicU32::new(0));
//!
//! let result = retry_unprocessed(
//!     || {
//!         let calls = calls.clone();
//!         async move {
//!             if calls.fetch_add(1, Ordering::SeqCst) == 0 {
//!                 Ok::<_, String>(BatchResult::new(vec!["a"], vec!["b"]))
//!             } else {
//!                 Ok(BatchResult::new(vec!["b"], vec![]))
//!             }
//!         }
//!     },
//!     &RetryConfig::default(),
//! )
//! .await
//! .unwrap();
//!
//! assert_eq!(result.data, vec!["a", "b"]);
//! assert!(result.is_complete());
//! # });
//! ```
//!
//! # Failure semantics
//!
//! - An error from the **first** call is returned unchanged.
//! - An error from a **retry** is logged and the loop carries on with the
//!   previous result, as if that attempt had not happened.
//! - Running out of retries is not an error. The returned `unprocessed`
//!   list tells the caller what is left.

mod policy;

pub use policy::{calculate_delay_with_jitter, RetryConfig, JITTER};

use std::fmt;
use std::future::Future;

/// Outcome of a batch operation that returns data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<T, U> {
    /// Items the operation completed.
    pub data: Vec<T>,
    /// Items the operation could not complete.
    pub unprocessed: Vec<U>,
}

impl<T, U> BatchResult<T, U> {
    /// Create a result.
    pub fn new(data: Vec<T>, unprocessed: Vec<U>) -> Self {
        Self { data, unprocessed }
    }

    /// True when nothing is left unprocessed.
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    /// Append `next.data`, and take `next.unprocessed` as the latest remainder.
    fn absorb(mut self, next: Self) -> Self {
        self.data.extend(next.data);
        self.unprocessed = next.unprocessed;
        self
    }
}

impl<T, U> Default for BatchResult<T, U> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Outcome of a batch delete, which returns no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult<U> {
    /// Items the operation could not delete.
    pub unprocessed: Vec<U>,
}

impl<U> DeleteResult<U> {
    /// Create a result.
    pub fn new(unprocessed: Vec<U>) -> Self {
        Self { unprocessed }
    }

    /// True when nothing is left unprocessed.
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

impl<U> Default for DeleteResult<U> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Anything that reports a count of unfinished items.
trait Remainder {
    fn remaining(&self) -> usize;
}

impl<T, U> Remainder for BatchResult<T, U> {
    fn remaining(&self) -> usize {
        self.unprocessed.len()
    }
}

impl<U> Remainder for DeleteResult<U> {
    fn remaining(&self) -> usize {
        self.unprocessed.len()
    }
}

/// Re-run a partially successful batch operation until it completes.
///
/// `data` from every successful attempt is concatenated in order;
/// `unprocessed` is always the latest attempt's remainder.
///
/// # Example
///
/// ```rust
/// use slackwater::retry::{retry_unprocessed, BatchResult, RetryConfig};
///
/// # tokio_test::block_on(async {
/// let result = retry_unprocessed(
///     || async { Ok::<_, String>(BatchResult::<u32, u32>::new(vec![1, 2], vec![])) },
///     &RetryConfig::default(),
/// )
/// .await;
///
/// assert_eq!(result, Ok(BatchResult::new(vec![1, 2], vec![])));
/// # });
/// ```
pub async fn retry_unprocessed<T, U, E, F, Fut>(
    operation: F,
    config: &RetryConfig,
) -> Result<BatchResult<T, U>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<BatchResult<T, U>, E>>,
    E: fmt::Display,
{
    run(operation, config, "batch write", BatchResult::absorb).await
}

/// Re-run a partially successful batch delete until it completes.
///
/// Only the latest attempt's `unprocessed` is kept.
///
/// # Example
///
/// ```rust
/// use slackwater::retry::{retry_unprocessed_delete, DeleteResult, RetryConfig};
///
/// # tokio_test::block_on(async {
/// let config = RetryConfig::default().with_max_retries(0);
/// let result = retry_unprocessed_delete(
///     || async { Ok::<_, String>(DeleteResult::new(vec!["k1"])) },
///     &config,
/// )
/// .await
/// .unwrap();
///
/// assert_eq!(result.unprocessed, vec!["k1"]);
/// # });
/// ```
pub async fn retry_unprocessed_delete<U, E, F, Fut>(
    operation: F,
    config: &RetryConfig,
) -> Result<DeleteResult<U>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<DeleteResult<U>, E>>,
    E: fmt::Display,
{
    run(operation, config, "batch delete", |_, next| next).await
}

async fn run<R, E, F, Fut, M>(
    mut operation: F,
    config: &RetryConfig,
    label: &'static str,
    merge: M,
) -> Result<R, E>
where
    R: Remainder,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
    M: Fn(R, R) -> R,
{
    let mut result = operation().await?;
    let mut retry_count = 0u32;

    while result.remaining() > 0 && retry_count < config.max_retries() {
        let delay = config.delay_for_retry(retry_count);
        tracing::debug!(
            operation = label,
            retry_count,
            unprocessed = result.remaining(),
            delay_ms = delay.as_millis() as u64,
            "retrying unprocessed items"
        );
        tokio::time::sleep(delay).await;
        retry_count += 1;

        match operation().await {
            Ok(next) => result = merge(result, next),
            Err(error) => {
                tracing::error!(
                    operation = label,
                    retry_count,
                    error = %error,
                    "retry attempt failed, keeping previous unprocessed items"
                );
            }
        }
    }

    if result.remaining() > 0 {
        tracing::error!(
            operation = label,
            retries = retry_count,
            unprocessed = result.remaining(),
            "unprocessed items remain after exhausting retries"
        );
    } else if retry_count > 0 {
        tracing::info!(
            operation = label,
            retries = retry_count,
            "all items processed after retrying"
        );
    }

    Ok(result)
}
