//! External-API classifier.
//!
//! Order: rate limited, then transient, then permanent. Unmatched failures
//! are permanent.

use std::time::Duration;

use super::patterns::{
    contains_any, contains_code, API_PERMANENT, API_PERMANENT_CODES, API_RATE_LIMITED,
    API_RATE_LIMITED_CODES, API_TRANSIENT, API_TRANSIENT_CODES,
};
use super::{Category, Classification, IssuePriority, Subject};

const RATE_LIMIT_DELAY: Duration = Duration::from_millis(60_000);
const RATE_LIMIT_MAX_RETRIES: u32 = 3;

const TRANSIENT_DELAY: Duration = Duration::from_millis(5_000);
const TRANSIENT_MAX_RETRIES: u32 = 3;

pub(super) fn classify(subject: &Subject<'_>, service: &str) -> Classification {
    let text = subject.text();

    if contains_any(text, API_RATE_LIMITED) || contains_code(text, API_RATE_LIMITED_CODES) {
        return Classification::retry(
            Category::RateLimited,
            RATE_LIMIT_DELAY,
            RATE_LIMIT_MAX_RETRIES,
            format!("{} rate limit hit: {}", service, subject.display()),
        );
    }

    if contains_any(text, API_TRANSIENT) || contains_code(text, API_TRANSIENT_CODES) {
        return Classification::retry(
            Category::Transient,
            TRANSIENT_DELAY,
            TRANSIENT_MAX_RETRIES,
            format!("{} temporarily unavailable: {}", service, subject.display()),
        );
    }

    if contains_any(text, API_PERMANENT) || contains_code(text, API_PERMANENT_CODES) {
        return Classification::no_retry(
            Category::Permanent,
            format!("{} rejected the request: {}", service, subject.display()),
        )
        .with_issue(IssuePriority::Normal);
    }

    Classification::no_retry(
        Category::Permanent,
        format!("Unrecognized {} failure: {}", service, subject.display()),
    )
    .with_issue(IssuePriority::Normal)
}
