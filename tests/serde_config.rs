//! Loading configuration and exporting verdicts with the `serde` feature.

#![cfg(feature = "serde")]

use std::time::Duration;

use slackwater::classify::{classify_error, ClassifyOptions, ErrorDomain, Failure};
use slackwater::{BreakerConfig, CircuitState, RetryConfig};

#[test]
fn retry_config_fills_missing_keys_with_defaults() {
    let config: RetryConfig = serde_json::from_str(r#"{ "max_retries": 5 }"#).unwrap();

    assert_eq!(config.max_retries(), 5);
    assert_eq!(config.initial_delay(), Duration::from_millis(100));
    assert_eq!(config.multiplier(), 2.0);
    assert_eq!(config.max_delay(), Duration::from_millis(20_000));
}

#[test]
fn retry_config_reads_millisecond_fields() {
    let config: RetryConfig =
        serde_json::from_str(r#"{ "initial_delay_ms": 250, "max_delay_ms": 4000, "multiplier": 0.5 }"#)
            .unwrap();

    assert_eq!(config.initial_delay(), Duration::from_millis(250));
    assert_eq!(config.max_delay(), Duration::from_millis(4_000));
    // Shrinking backoff is clamped.
    assert_eq!(config.multiplier(), 1.0);
}

#[test]
fn breaker_config_from_partial_map() {
    let config: BreakerConfig =
        serde_json::from_str(r#"{ "name": "ytdlp", "reset_timeout_ms": 120000, "failure_threshold": 0 }"#)
            .unwrap();

    assert_eq!(config.name(), "ytdlp");
    assert_eq!(config.reset_timeout(), Duration::from_secs(120));
    assert_eq!(config.failure_threshold(), 1);
    assert_eq!(config.success_threshold(), 2);
}

#[test]
fn domain_and_state_use_wire_names() {
    let domain: ErrorDomain = serde_json::from_str(r#""external-api""#).unwrap();
    assert_eq!(domain, ErrorDomain::ExternalApi);

    assert_eq!(
        serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
        r#""HALF_OPEN""#
    );
}

#[test]
fn classification_serializes_for_issue_bodies() {
    let verdict = classify_error(
        &Failure::new("duplicate key value violates unique constraint"),
        ErrorDomain::Database,
        &ClassifyOptions::default(),
    );

    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["category"], "permanent");
    assert_eq!(json["retryable"], false);
    assert_eq!(json["retry_delay_ms"], serde_json::Value::Null);
    assert_eq!(json["create_issue"], true);
    assert_eq!(json["issue_priority"], "high");
}
