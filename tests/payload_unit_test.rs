//! Unit tests for submission payload validation.
//!
//! Run with: cargo test --test payload_unit_test

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, FixedOffset};
use serde_json::json;

use pestwatch::routes::ingest::{extract_credential, parse_payload};

fn field_messages(payload: &serde_json::Value) -> Vec<(&'static str, String)> {
    parse_payload(payload)
        .unwrap_err()
        .into_iter()
        .map(|e| (e.field, e.message))
        .collect()
}

#[test]
fn minimal_payload_applies_defaults() {
    let reading = parse_payload(&json!({
        "temperature": 25.5,
        "humidity": 65.2,
    }))
    .unwrap();

    assert_eq!(reading.temperature, 25.5);
    assert_eq!(reading.humidity, 65.2);
    assert_eq!(reading.pest_count_primary, 0);
    assert_eq!(reading.pest_count_secondary, 0);
    assert!(!reading.rainfall_detected);
    assert!(!reading.irrigation_active);
    assert_eq!(reading.soil_moisture, None);
    assert_eq!(reading.model_confidence, None);
    assert_eq!(reading.observed_at, None);
}

#[test]
fn full_payload_round_trips() {
    let reading = parse_payload(&json!({
        "temperature": 25,
        "humidity": 65.2,
        "soil_moisture": 41.0,
        "pest_count_primary": 75,
        "pest_count_secondary": 5,
        "rainfall_detected": false,
        "irrigation_active": true,
        "model_confidence": 0.93,
        "observed_at": "2026-08-30T12:00:00Z",
    }))
    .unwrap();

    // Integer-valued JSON numbers are accepted for float fields
    assert_eq!(reading.temperature, 25.0);
    assert_eq!(reading.pest_count_primary, 75);
    assert_eq!(reading.pest_count_secondary, 5);
    assert!(reading.irrigation_active);
    assert_eq!(reading.soil_moisture, Some(41.0));
    assert_eq!(reading.model_confidence, Some(0.93));
    let expected: DateTime<FixedOffset> =
        DateTime::parse_from_rfc3339("2026-08-30T12:00:00Z").unwrap();
    assert_eq!(reading.observed_at, Some(expected));
}

#[test]
fn missing_required_fields_are_reported_per_field() {
    let errors = field_messages(&json!({ "humidity": 50.0 }));
    assert_eq!(errors, vec![("temperature", "is required".to_string())]);

    let errors = field_messages(&json!({}));
    assert_eq!(
        errors,
        vec![
            ("temperature", "is required".to_string()),
            ("humidity", "is required".to_string()),
        ]
    );
}

#[test]
fn non_numeric_required_fields_are_rejected() {
    let errors = field_messages(&json!({
        "temperature": "hot",
        "humidity": 50.0,
    }));
    assert_eq!(errors, vec![("temperature", "must be a number".to_string())]);
}

#[test]
fn pest_counts_must_be_non_negative_integers() {
    for bad in [json!(-1), json!(2.5), json!("12")] {
        let errors = field_messages(&json!({
            "temperature": 20.0,
            "humidity": 50.0,
            "pest_count_primary": bad,
        }));
        assert_eq!(
            errors,
            vec![("pest_count_primary", "must be a non-negative integer".to_string())],
        );
    }
}

#[test]
fn flags_must_be_booleans() {
    let errors = field_messages(&json!({
        "temperature": 20.0,
        "humidity": 50.0,
        "rainfall_detected": "yes",
    }));
    assert_eq!(
        errors,
        vec![("rainfall_detected", "must be a boolean".to_string())],
    );
}

#[test]
fn malformed_observed_at_rejects_the_submission() {
    // Presence of a malformed timestamp is an error; it must never be
    // silently replaced with the current time.
    for bad in [json!("yesterday"), json!("2026-13-40T00:00:00Z"), json!(12345)] {
        let errors = field_messages(&json!({
            "temperature": 20.0,
            "humidity": 50.0,
            "observed_at": bad,
        }));
        assert_eq!(
            errors,
            vec![("observed_at", "must be an RFC 3339 timestamp".to_string())],
        );
    }
}

#[test]
fn null_optional_fields_behave_like_absent_ones() {
    let reading = parse_payload(&json!({
        "temperature": 20.0,
        "humidity": 50.0,
        "observed_at": null,
        "soil_moisture": null,
        "pest_count_primary": null,
    }))
    .unwrap();
    assert_eq!(reading.observed_at, None);
    assert_eq!(reading.soil_moisture, None);
    assert_eq!(reading.pest_count_primary, 0);
}

#[test]
fn non_object_body_is_rejected() {
    let errors = field_messages(&json!([1, 2, 3]));
    assert_eq!(errors, vec![("body", "must be a JSON object".to_string())]);
}

#[test]
fn credential_extraction_strips_bearer_prefix() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer secret-token-123"),
    );
    assert_eq!(extract_credential(&headers), Some("secret-token-123"));
}

#[test]
fn credential_extraction_accepts_raw_token() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("secret-token-123"),
    );
    assert_eq!(extract_credential(&headers), Some("secret-token-123"));
}

#[test]
fn credential_whitespace_is_significant() {
    // The token is compared verbatim; padding is part of the credential
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer secret-token-123 "),
    );
    assert_eq!(extract_credential(&headers), Some("secret-token-123 "));
}

#[test]
fn missing_or_empty_credential_yields_none() {
    let headers = HeaderMap::new();
    assert_eq!(extract_credential(&headers), None);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert_eq!(extract_credential(&headers), None);
}
