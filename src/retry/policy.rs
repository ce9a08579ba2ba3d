//! Retry configuration and backoff delays.

use std::time::Duration;

use rand::Rng;

/// Upper bound (exclusive) of the jitter added to every delay.
pub const JITTER: Duration = Duration::from_millis(1_000);

/// How many times, and how patiently, to retry unprocessed items.
///
/// Configs are plain values: start from [`RetryConfig::default`] and
/// override what the call needs. Anything not overridden keeps its default.
///
/// | field | default |
/// |---|---|
/// | `max_retries` | 3 |
/// | `initial_delay` | 100ms |
/// | `multiplier` | 2.0 |
/// | `max_delay` | 20s |
///
/// # Examples
///
/// ```rust
/// use slackwater::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default().with_max_retries(5);
///
/// assert_eq!(config.max_retries(), 5);
/// assert_eq!(config.initial_delay(), Duration::from_millis(100));
/// assert_eq!(config.max_delay(), Duration::from_secs(20));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "RawRetryConfig"))]
pub struct RetryConfig {
    max_retries: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(20_000),
        }
    }
}

impl RetryConfig {
    /// Set the number of retries after the first attempt.
    ///
    /// `0` means a single attempt and no sleeping.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the delay before the first retry, before jitter.
    pub fn with_initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    /// Set the growth factor between consecutive delays.
    ///
    /// Values below `1.0` (and NaN) are raised to `1.0`.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        self
    }

    /// Set the cap applied to the exponential delay, before jitter.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Get the growth factor.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Get the delay cap.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// The jittered delay to sleep before retry number `retry_count` (0-indexed).
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        calculate_delay_with_jitter(
            self.initial_delay,
            retry_count,
            self.multiplier,
            self.max_delay,
        )
    }
}

/// Exponential backoff with additive jitter.
///
/// `min(base * multiplier^retry_count, max_delay)` plus a uniform draw from
/// `[0, 1000ms)`. Jitter is added after the cap, so the longest possible
/// delay is just under `max_delay + 1s`.
///
/// # Examples
///
/// ```rust
/// use slackwater::retry::calculate_delay_with_jitter;
/// use std::time::Duration;
///
/// let delay = calculate_delay_with_jitter(
///     Duration::from_millis(100),
///     0,
///     2.0,
///     Duration::from_secs(20),
/// );
///
/// assert!(delay >= Duration::from_millis(100));
/// assert!(delay < Duration::from_millis(1_100));
/// ```
pub fn calculate_delay_with_jitter(
    base: Duration,
    retry_count: u32,
    multiplier: f64,
    max_delay: Duration,
) -> Duration {
    let capped = backoff_without_jitter(base, retry_count, multiplier, max_delay);
    let jitter_nanos = rand::rng().random_range(0..JITTER.as_nanos() as u64);
    capped.saturating_add(Duration::from_nanos(jitter_nanos))
}

/// The capped exponential part of [`calculate_delay_with_jitter`].
pub(crate) fn backoff_without_jitter(
    base: Duration,
    retry_count: u32,
    multiplier: f64,
    max_delay: Duration,
) -> Duration {
    let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
    let exponential_ms = base.as_secs_f64() * 1_000.0 * multiplier.powi(exponent);
    let max_ms = max_delay.as_secs_f64() * 1_000.0;

    // f64::min discards NaN, so a NaN product lands on the cap.
    let capped_ms = exponential_ms.min(max_ms).max(0.0);
    if capped_ms >= max_ms {
        return max_delay;
    }
    Duration::from_nanos((capped_ms * 1_000_000.0) as u64)
}

/// Partial, millisecond-based form accepted by the `serde` feature.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(default)]
struct RawRetryConfig {
    max_retries: u32,
    initial_delay_ms: u64,
    multiplier: f64,
    max_delay_ms: u64,
}

#[cfg(feature = "serde")]
impl Default for RawRetryConfig {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            multiplier: defaults.multiplier,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

#[cfg(feature = "serde")]
impl From<RawRetryConfig> for RetryConfig {
    fn from(raw: RawRetryConfig) -> Self {
        RetryConfig::default()
            .with_max_retries(raw.max_retries)
            .with_initial_delay(Duration::from_millis(raw.initial_delay_ms))
            .with_multiplier(raw.multiplier)
            .with_max_delay(Duration::from_millis(raw.max_delay_ms))
    }
}
