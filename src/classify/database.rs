//! Database-domain classifier.
//!
//! Order: transient, then permanent. Unmatched failures are transient. A
//! recognized driver error gets a reduced retry budget and no issue; a fully
//! unknown failure keeps the full budget and gets an issue.

use std::time::Duration;

use super::patterns::{
    contains_any, contains_pair, DB_PERMANENT, DB_PERMANENT_PAIRS, DB_TRANSIENT, DB_WRAPPER_NAMES,
};
use super::{Category, Classification, IssuePriority, Subject};

const TRANSIENT_DELAY: Duration = Duration::from_millis(500);
const TRANSIENT_MAX_RETRIES: u32 = 3;

const WRAPPER_DELAY: Duration = Duration::from_millis(1_000);
const WRAPPER_MAX_RETRIES: u32 = 2;

const UNKNOWN_DELAY: Duration = Duration::from_millis(1_000);
const UNKNOWN_MAX_RETRIES: u32 = 3;

pub(super) fn classify(subject: &Subject<'_>) -> Classification {
    let text = subject.text();

    if contains_any(text, DB_TRANSIENT) {
        return Classification::retry(
            Category::Transient,
            TRANSIENT_DELAY,
            TRANSIENT_MAX_RETRIES,
            format!("Transient database failure: {}", subject.display()),
        );
    }

    if contains_any(text, DB_PERMANENT) || contains_pair(text, DB_PERMANENT_PAIRS) {
        return Classification::no_retry(
            Category::Permanent,
            format!("Database constraint or query error: {}", subject.display()),
        )
        .with_issue(IssuePriority::High);
    }

    if is_driver_error(subject) {
        return Classification::retry(
            Category::Transient,
            WRAPPER_DELAY,
            WRAPPER_MAX_RETRIES,
            format!("Unrecognized database driver error: {}", subject.display()),
        );
    }

    Classification::retry(
        Category::Transient,
        UNKNOWN_DELAY,
        UNKNOWN_MAX_RETRIES,
        format!("Unknown database failure: {}", subject.display()),
    )
    .with_issue(IssuePriority::Normal)
}

fn is_driver_error(subject: &Subject<'_>) -> bool {
    subject
        .name
        .as_deref()
        .is_some_and(|name| contains_any(name, DB_WRAPPER_NAMES))
}
