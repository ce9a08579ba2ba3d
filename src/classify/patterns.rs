//! Substring tables for the domain classifiers.
//!
//! All tokens are lowercase and are matched against the lowercased message.
//! SQLSTATE codes appear in their lowercased form (`40p01`, not `40P01`).

/// True when any token occurs in `text`.
pub(super) fn contains_any(text: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| text.contains(token))
}

/// True when both halves of any pair occur in `text`.
pub(super) fn contains_pair(text: &str, pairs: &[(&str, &str)]) -> bool {
    pairs
        .iter()
        .any(|(first, second)| text.contains(first) && text.contains(second))
}

/// True when any code occurs in `text` as a whole token, not as part of a
/// longer number or word (`"500"` matches `"http 500"`, not `"1500ms"`).
pub(super) fn contains_code(text: &str, codes: &[&str]) -> bool {
    codes.iter().any(|code| {
        text.match_indices(code).any(|(at, _)| {
            let before = text[..at].chars().next_back();
            let after = text[at + code.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && !after.is_some_and(|c| c.is_ascii_alphanumeric())
        })
    })
}

// ===== Auth =====

pub(super) const AUTH_EXPIRED: &[&str] = &["expired", "invalid_grant"];

pub(super) const AUTH_TRANSIENT: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "econnreset",
    "econnrefused",
    "enotfound",
    "socket hang up",
    "connection reset",
    "connection refused",
    "temporarily unavailable",
    "service unavailable",
];

pub(super) const AUTH_INVALID: &[&str] = &[
    "invalid",
    "unauthorized",
    "unauthenticated",
    "forbidden",
    "access denied",
    "bad credentials",
    "incorrect username or password",
    "not authorized",
];

pub(super) const AUTH_INVALID_CODES: &[&str] = &["401", "403"];

// ===== Database =====

pub(super) const DB_TRANSIENT: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection terminated",
    "connection timeout",
    "connection timed out",
    "connection closed",
    "server closed the connection",
    "terminating connection",
    "could not connect",
    "too many clients",
    "too many connections",
    "remaining connection slots",
    "the database system is starting up",
    "the database system is shutting down",
    "could not serialize access",
    "deadlock detected",
    "lock timeout",
    "statement timeout",
    "canceling statement due to",
    "econnrefused",
    "econnreset",
    "etimedout",
    "pool timed out",
    // connection_exception family
    "08000",
    "08001",
    "08003",
    "08004",
    "08006",
    // serialization_failure, deadlock_detected
    "40001",
    "40p01",
    // insufficient_resources, too_many_connections
    "53000",
    "53300",
    // admin_shutdown, crash_shutdown, cannot_connect_now
    "57p01",
    "57p02",
    "57p03",
];

pub(super) const DB_PERMANENT: &[&str] = &[
    "duplicate key",
    "unique constraint",
    "violates foreign key",
    "foreign key constraint",
    "violates not-null",
    "not-null constraint",
    "violates check constraint",
    "check constraint",
    "syntax error",
    "invalid input syntax",
    "invalid input value",
    "value too long",
    "out of range",
    // unique, foreign key, not-null, check violations
    "23505",
    "23503",
    "23502",
    "23514",
    // syntax_error, invalid_text_representation, string_data_right_truncation
    "42601",
    "22p02",
    "22001",
];

/// Both halves must appear. A bare "does not exist" shows up in too many
/// unrelated messages to count on its own.
pub(super) const DB_PERMANENT_PAIRS: &[(&str, &str)] = &[
    ("relation", "does not exist"),
    ("column", "does not exist"),
];

/// Type-name markers of database driver and ORM errors.
pub(super) const DB_WRAPPER_NAMES: &[&str] = &[
    "sqlx::",
    "tokio_postgres::",
    "postgres::",
    "diesel::",
    "databaseerror",
    "dberror",
];

// ===== External API =====

pub(super) const API_RATE_LIMITED: &[&str] = &[
    "too many requests",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "rate exceeded",
    "throttl",
    "quota",
];

pub(super) const API_RATE_LIMITED_CODES: &[&str] = &["429"];

pub(super) const API_TRANSIENT: &[&str] = &[
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "timeout",
    "timed out",
    "network",
    "econnreset",
    "econnrefused",
    "enotfound",
    "etimedout",
    "socket hang up",
    "connection reset",
    "connection refused",
];

pub(super) const API_TRANSIENT_CODES: &[&str] = &["500", "502", "503", "504"];

pub(super) const API_PERMANENT: &[&str] = &[
    "bad request",
    "unauthorized",
    "forbidden",
    "not found",
    "method not allowed",
    "conflict",
    "unprocessable",
    "invalid",
];

pub(super) const API_PERMANENT_CODES: &[&str] =
    &["400", "401", "403", "404", "405", "409", "410", "422"];
