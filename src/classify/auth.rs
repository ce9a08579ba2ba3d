//! Auth-domain classifier.
//!
//! Order: expired, then transient, then invalid. Unmatched failures are
//! invalid credentials and get an issue.

use std::time::Duration;

use super::patterns::{
    contains_any, contains_code, AUTH_EXPIRED, AUTH_INVALID, AUTH_INVALID_CODES, AUTH_TRANSIENT,
};
use super::{Category, Classification, IssuePriority, Subject};

const TRANSIENT_DELAY: Duration = Duration::from_millis(1_000);
const TRANSIENT_MAX_RETRIES: u32 = 2;

pub(super) fn classify(subject: &Subject<'_>) -> Classification {
    let text = subject.text();

    if contains_any(text, AUTH_EXPIRED) {
        return Classification::no_retry(
            Category::AuthExpired,
            format!("Credentials expired, re-authentication required: {}", subject.display()),
        );
    }

    if contains_any(text, AUTH_TRANSIENT) {
        return Classification::retry(
            Category::Transient,
            TRANSIENT_DELAY,
            TRANSIENT_MAX_RETRIES,
            format!("Transient failure reaching auth provider: {}", subject.display()),
        );
    }

    if contains_any(text, AUTH_INVALID) || contains_code(text, AUTH_INVALID_CODES) {
        return Classification::no_retry(
            Category::AuthInvalid,
            format!("Invalid or unauthorized credentials: {}", subject.display()),
        );
    }

    Classification::no_retry(
        Category::AuthInvalid,
        format!("Unrecognized auth failure: {}", subject.display()),
    )
    .with_issue(IssuePriority::Normal)
}
