//! Unit tests for query window resolution.
//!
//! Run with: cargo test --test window_unit_test

use chrono::{DateTime, Duration, Utc};

use pestwatch::error::AppError;
use pestwatch::routes::{resolve_window, Window};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[test]
fn absent_bounds_without_default_are_unbounded() {
    let window = resolve_window(None, None, None).unwrap();
    assert_eq!(window, Window { start: None, end: None });
}

#[test]
fn absent_bounds_with_default_give_trailing_24h() {
    let now = utc("2026-08-30T15:00:00Z");
    let window = resolve_window(None, None, Some(now)).unwrap();
    assert_eq!(window.start, Some(now - Duration::hours(24)));
    assert_eq!(window.end, None);
}

#[test]
fn explicit_bound_suppresses_the_default() {
    let now = utc("2026-08-30T15:00:00Z");
    let window = resolve_window(Some("2026-01-01T00:00:00Z"), None, Some(now)).unwrap();
    assert_eq!(window.start, Some(utc("2026-01-01T00:00:00Z")));
    assert_eq!(window.end, None);
}

#[test]
fn rfc3339_bounds_are_normalized_to_utc() {
    let window = resolve_window(
        Some("2026-08-01T10:00:00+02:00"),
        Some("2026-08-02T10:00:00Z"),
        None,
    )
    .unwrap();
    assert_eq!(window.start, Some(utc("2026-08-01T08:00:00Z")));
    assert_eq!(window.end, Some(utc("2026-08-02T10:00:00Z")));
}

#[test]
fn bare_dates_cover_the_whole_day() {
    let window = resolve_window(Some("2026-08-01"), Some("2026-08-02"), None).unwrap();
    assert_eq!(window.start, Some(utc("2026-08-01T00:00:00Z")));
    assert_eq!(window.end, Some(utc("2026-08-02T23:59:59.999999Z")));
}

#[test]
fn same_day_date_window_is_valid() {
    let window = resolve_window(Some("2026-08-01"), Some("2026-08-01"), None).unwrap();
    assert!(window.start.unwrap() < window.end.unwrap());
}

#[test]
fn unparseable_bounds_are_rejected() {
    for bad in ["last tuesday", "2026/08/01", "2026-08-01 10:00:00"] {
        let err = resolve_window(Some(bad), None, None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "accepted {bad:?}");
        let err = resolve_window(None, Some(bad), None).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "accepted {bad:?}");
    }
}

#[test]
fn end_before_start_is_rejected() {
    let err = resolve_window(Some("2026-08-02"), Some("2026-08-01"), None).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
