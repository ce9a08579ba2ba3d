//! Failure classification.
//!
//! [`classify_error`] turns a caught failure into a [`Classification`]: a
//! verdict on whether to retry, how long to wait, and whether the failure
//! deserves a tracked issue. Classification is pure. The same message and
//! domain always produce the same verdict, with no clock, randomness, or
//! shared state involved.
//!
//! # Quick Start
//!
//! ```rust
//! use slackwater::classify::{classify_error, Category, ClassifyOptions, ErrorDomain, Failure};
//! use std::time::Duration;
//!
//! let options = ClassifyOptions::new().with_service_name("YouTube");
//! let verdict = classify_error(
//!     &Failure::new("429 Too Many Requests"),
//!     ErrorDomain::ExternalApi,
//!     &options,
//! );
//!
//! assert_eq!(verdict.category(), Category::RateLimited);
//! assert_eq!(verdict.retry_delay(), Some(Duration::from_secs(60)));
//! assert!(verdict.reason().contains("YouTube"));
//! ```
//!
//! # Domains
//!
//! Each [`ErrorDomain`] checks the lowercased message against ordered
//! pattern groups and the first matching group wins:
//!
//! - **Auth**: expired → transient → invalid, defaulting to `auth_invalid`
//! - **Database**: transient → permanent, defaulting to `transient`
//! - **External API**: rate limited → transient → permanent, defaulting to `permanent`

mod auth;
mod database;
mod external_api;
mod patterns;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Maximum length of [`Classification::reason`], in characters.
pub const MAX_REASON_CHARS: usize = 150;

const DEFAULT_SERVICE_NAME: &str = "external API";

/// A caught failure, reduced to what classification looks at.
///
/// # Example
///
/// ```rust
/// use slackwater::classify::Failure;
///
/// let io = std::io::Error::other("connection reset by peer");
/// let failure = Failure::from_error(&io);
///
/// assert_eq!(failure.message(), Some("connection reset by peer"));
/// assert!(failure.name().is_some_and(|n| n.contains("io")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Failure {
    name: Option<String>,
    message: Option<String>,
}

impl Failure {
    /// A failure known only by its message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: Some(message.into()),
        }
    }

    /// A failure with an explicit type name, e.g. the driver error it came from.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: Some(message.into()),
        }
    }

    /// A failure with neither name nor message.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture a Rust error.
    ///
    /// The message is the error's `Display` followed by any `source()` messages
    /// that it does not already include. The name is the error's type path.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error,
    {
        Self {
            name: Some(std::any::type_name::<E>().to_string()),
            message: Some(chain_message(error)),
        }
    }

    /// Capture a type-erased error. Its concrete type is unknown, so the
    /// failure carries no name.
    pub fn from_dyn_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            name: None,
            message: Some(chain_message(error)),
        }
    }

    /// The failure's type name, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The failure's message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The trimmed message, or `None` when there is nothing usable to match on.
    fn usable_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

fn chain_message(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// The dependency family a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ErrorDomain {
    /// Identity providers, token exchange, session validation.
    Auth,
    /// The relational database.
    Database,
    /// Third-party HTTP APIs.
    ExternalApi,
}

impl ErrorDomain {
    /// All domains, in declaration order.
    pub const ALL: [ErrorDomain; 3] = [
        ErrorDomain::Auth,
        ErrorDomain::Database,
        ErrorDomain::ExternalApi,
    ];

    /// The domain's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorDomain::Auth => "auth",
            ErrorDomain::Database => "database",
            ErrorDomain::ExternalApi => "external-api",
        }
    }
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognized domain name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error domain '{0}' (expected auth, database or external-api)")]
pub struct UnknownDomain(pub String);

impl FromStr for ErrorDomain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(ErrorDomain::Auth),
            "database" => Ok(ErrorDomain::Database),
            "external-api" => Ok(ErrorDomain::ExternalApi),
            other => Err(UnknownDomain(other.to_string())),
        }
    }
}

/// Optional inputs to [`classify_error`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifyOptions {
    service_name: Option<String>,
}

impl ClassifyOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the external service, used in external-API reasons.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// The configured service name, if any.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub(crate) fn service_label(&self) -> &str {
        self.service_name().unwrap_or(DEFAULT_SERVICE_NAME)
    }
}

/// What kind of failure this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    /// Infrastructure blip; safe to retry with backoff.
    Transient,
    /// Explicit throttling; retry after a long fixed delay.
    RateLimited,
    /// Caller, schema or logic error; never retried.
    Permanent,
    /// Credential lifetime exceeded; re-authentication required.
    AuthExpired,
    /// Bad credentials or unauthorized.
    AuthInvalid,
}

impl Category {
    /// The category's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transient => "transient",
            Category::RateLimited => "rate_limited",
            Category::Permanent => "permanent",
            Category::AuthExpired => "auth_expired",
            Category::AuthInvalid => "auth_invalid",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of an issue filed for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IssuePriority {
    /// Track it, no urgency.
    Normal,
    /// Likely a code or schema bug that needs attention.
    High,
}

/// The verdict on a caught failure.
///
/// Constructed through [`Classification::retry`] or
/// [`Classification::no_retry`], which keep the optional fields consistent:
/// a retry delay exists only for retryable failures and an issue priority
/// only when an issue is recommended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Classification {
    category: Category,
    retryable: bool,
    #[cfg_attr(feature = "serde", serde(rename = "retry_delay_ms", with = "opt_millis"))]
    retry_delay: Option<Duration>,
    max_retries: u32,
    reason: String,
    create_issue: bool,
    issue_priority: Option<IssuePriority>,
}

impl Classification {
    /// A retryable verdict.
    pub fn retry(
        category: Category,
        delay: Duration,
        max_retries: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            retryable: true,
            retry_delay: Some(delay),
            max_retries,
            reason: truncate_reason(reason.into()),
            create_issue: false,
            issue_priority: None,
        }
    }

    /// A verdict that must not be retried automatically.
    pub fn no_retry(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            retryable: false,
            retry_delay: None,
            max_retries: 0,
            reason: truncate_reason(reason.into()),
            create_issue: false,
            issue_priority: None,
        }
    }

    /// Recommend filing an issue at the given priority.
    pub fn with_issue(mut self, priority: IssuePriority) -> Self {
        self.create_issue = true;
        self.issue_priority = Some(priority);
        self
    }

    /// The failure category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Whether retrying may help.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// How long to wait before retrying. `None` when not retryable.
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_delay
    }

    /// Retry budget for this failure.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Human-readable explanation, at most [`MAX_REASON_CHARS`] characters.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether the failure warrants a tracked issue.
    pub fn should_create_issue(&self) -> bool {
        self.create_issue
    }

    /// Priority for the tracked issue, when one is recommended.
    pub fn issue_priority(&self) -> Option<IssuePriority> {
        self.issue_priority
    }
}

#[cfg(feature = "serde")]
mod opt_millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }
}

/// Classify a failure for the given domain.
///
/// Never panics. A failure with no usable message gets the domain's default
/// verdict.
///
/// # Example
///
/// ```rust
/// use slackwater::classify::{classify_error, Category, ClassifyOptions, ErrorDomain, IssuePriority};
///
/// let verdict = classify_error(
///     &"duplicate key value violates unique constraint".into(),
///     ErrorDomain::Database,
///     &ClassifyOptions::default(),
/// );
///
/// assert_eq!(verdict.category(), Category::Permanent);
/// assert!(!verdict.is_retryable());
/// assert_eq!(verdict.issue_priority(), Some(IssuePriority::High));
/// ```
pub fn classify_error(
    failure: &Failure,
    domain: ErrorDomain,
    options: &ClassifyOptions,
) -> Classification {
    let subject = Subject::new(failure);
    let verdict = match domain {
        ErrorDomain::Auth => auth::classify(&subject),
        ErrorDomain::Database => database::classify(&subject),
        ErrorDomain::ExternalApi => external_api::classify(&subject, options.service_label()),
    };

    tracing::debug!(
        domain = %domain,
        category = %verdict.category(),
        retryable = verdict.is_retryable(),
        "classified failure"
    );
    verdict
}

/// What the domain classifiers match against.
struct Subject<'a> {
    original: Option<&'a str>,
    lowered: Option<String>,
    name: Option<String>,
}

impl<'a> Subject<'a> {
    fn new(failure: &'a Failure) -> Self {
        let original = failure.usable_message();
        Self {
            original,
            lowered: original.map(str::to_lowercase),
            name: failure.name().map(str::to_lowercase),
        }
    }

    /// Lowercased message, empty when absent.
    fn text(&self) -> &str {
        self.lowered.as_deref().unwrap_or("")
    }

    /// The message as written, for reasons.
    fn display(&self) -> &'a str {
        self.original.unwrap_or("no error message")
    }
}

/// Cap a reason at [`MAX_REASON_CHARS`] characters, marking the cut with `...`.
pub(crate) fn truncate_reason(reason: String) -> String {
    if reason.chars().count() <= MAX_REASON_CHARS {
        return reason;
    }
    let mut cut: String = reason.chars().take(MAX_REASON_CHARS - 3).collect();
    cut.push_str("...");
    cut
}
