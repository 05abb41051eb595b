//! Unit tests for alert evaluation and message rendering.
//!
//! Run with: cargo test --test alert_unit_test

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pestwatch::alert::{is_breach, render_alert_message, render_subject};
use pestwatch::entity::{devices, owners, readings};

fn owner(threshold: i32) -> owners::Model {
    owners::Model {
        id: Uuid::new_v4(),
        display_name: "Maria Keller".to_string(),
        contact_email: "maria@example.com".to_string(),
        alert_threshold: threshold,
        created_at: None,
        updated_at: None,
    }
}

fn device(owner_id: Uuid, location: Option<&str>) -> devices::Model {
    devices::Model {
        id: Uuid::new_v4(),
        owner_id,
        device_identifier: "trap-north-01".to_string(),
        credential: "secret".to_string(),
        display_name: "North Field Trap".to_string(),
        location: location.map(str::to_string),
        active: true,
        created_at: None,
        updated_at: None,
    }
}

fn reading(device_id: Uuid, pest_count: i32) -> readings::Model {
    let now = DateTime::parse_from_rfc3339("2026-08-30T14:30:00Z").unwrap();
    readings::Model {
        id: Uuid::new_v4(),
        device_id,
        observed_at: now,
        temperature: 27.4,
        humidity: 61.0,
        soil_moisture: Some(38.5),
        pest_count_primary: pest_count,
        pest_count_secondary: 3,
        rainfall_detected: false,
        irrigation_active: false,
        model_confidence: Some(0.91),
        recorded_at: Utc::now().fixed_offset(),
    }
}

#[test]
fn breach_is_strictly_greater_than_threshold() {
    assert!(is_breach(51, 50));
    assert!(is_breach(1, 0));
    assert!(!is_breach(50, 50));
    assert!(!is_breach(49, 50));
    assert!(!is_breach(0, 0));
}

#[test]
fn subject_names_the_device() {
    let subject = render_subject("North Field Trap");
    assert_eq!(subject, "Pest alert: high count detected - North Field Trap");
}

#[test]
fn message_carries_the_reading_details() {
    let owner = owner(50);
    let device = device(owner.id, Some("North field, row 12"));
    let reading = reading(device.id, 75);

    let message = render_alert_message(&owner, &device, &reading);
    assert!(message.starts_with("Dear Maria Keller,"));
    assert!(message.contains("\"North Field Trap\""));
    assert!(message.contains("- Location: North field, row 12"));
    assert!(message.contains("- Primary pest count: 75"));
    assert!(message.contains("- Secondary pest count: 3"));
    assert!(message.contains("- Threshold: 50"));
    assert!(message.contains("- Temperature: 27.4\u{b0}C"));
    assert!(message.contains("- Humidity: 61%"));
    assert!(message.contains("- Time: 2026-08-30 14:30:00"));
}

#[test]
fn missing_location_falls_back_to_placeholder() {
    let owner = owner(50);
    let device = device(owner.id, None);
    let reading = reading(device.id, 75);

    let message = render_alert_message(&owner, &device, &reading);
    assert!(message.contains("- Location: Not specified"));
}
