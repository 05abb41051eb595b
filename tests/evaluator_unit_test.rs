//! Unit tests for the alert evaluator over a mocked database.
//!
//! Run with: cargo test --test evaluator_unit_test

use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use uuid::Uuid;

use pestwatch::alert::evaluate;
use pestwatch::common::AppState;
use pestwatch::config::{Config, Deployment};
use pestwatch::entity::{alert_logs, devices, owners, readings};
use pestwatch::notifier::NotifierClient;

fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/pestwatch_test".to_string(),
        notifier_base_url: "http://127.0.0.1:9".to_string(),
        notifier_bearer_token: "test-token".to_string(),
        notifier_from_address: "alerts@test.local".to_string(),
        notifier_skip_tls_verify: false,
        notify_retry_max: 0,
        notify_retry_delay_seconds: 0,
        ingest_timeout_seconds: 5,
        summary_timeout_seconds: 30,
        api_host: "127.0.0.1".to_string(),
        api_port: 0,
        disable_rate_limiting: true,
        rate_limit_metadata_per_second: 1,
        rate_limit_metadata_burst: 60,
        rate_limit_data_per_second: 10,
        rate_limit_data_burst: 60,
        bulk_concurrent_limit: 5,
        deployment: Deployment::Local,
    }
}

fn state_with(db: DatabaseConnection) -> AppState {
    let config = test_config();
    let notifier = NotifierClient::new(&config);
    AppState::new(db, config, notifier)
}

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

fn device(owner_id: Uuid) -> devices::Model {
    devices::Model {
        id: Uuid::new_v4(),
        owner_id,
        device_identifier: "trap-north-01".to_string(),
        credential: "secret".to_string(),
        display_name: "North Field Trap".to_string(),
        location: None,
        active: true,
        created_at: None,
        updated_at: None,
    }
}

fn reading(device_id: Uuid, pest_count: i32) -> readings::Model {
    readings::Model {
        id: Uuid::new_v4(),
        device_id,
        observed_at: Utc::now().fixed_offset(),
        temperature: 27.4,
        humidity: 61.0,
        soil_moisture: None,
        pest_count_primary: pest_count,
        pest_count_secondary: 0,
        rainfall_detected: false,
        irrigation_active: false,
        model_confidence: None,
        recorded_at: Utc::now().fixed_offset(),
    }
}

fn alert_row(id: Uuid, reading_id: Uuid) -> alert_logs::Model {
    alert_logs::Model {
        id,
        reading_id,
        alert_kind: "threshold".to_string(),
        message: "test".to_string(),
        dispatched_to: "maria@example.com".to_string(),
        dispatched_at: Utc::now().fixed_offset(),
    }
}

#[tokio::test]
async fn count_at_threshold_records_nothing() {
    let owner = owner(50);
    let device = device(owner.id);
    let reading = reading(device.id, 50);

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owner]])
        .into_connection();
    let state = state_with(db);

    let result = evaluate(&state, &device, &reading).await.unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn breach_records_an_alert() {
    let owner = owner(50);
    let device = device(owner.id);
    let reading = reading(device.id, 75);
    let alert_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owner]])
        .append_query_results([Vec::<alert_logs::Model>::new()])
        .append_query_results([vec![alert_row(alert_id, reading.id)]])
        .into_connection();
    let state = state_with(db);

    let result = evaluate(&state, &device, &reading).await.unwrap();
    assert_eq!(result, Some(alert_id));
}

#[tokio::test]
async fn already_alerted_reading_is_a_noop() {
    let owner = owner(50);
    let device = device(owner.id);
    let reading = reading(device.id, 75);

    // Existence check finds a prior alert for this reading; no insert runs
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owner]])
        .append_query_results([vec![alert_row(Uuid::new_v4(), reading.id)]])
        .into_connection();
    let state = state_with(db);

    let result = evaluate(&state, &device, &reading).await.unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn losing_the_insert_race_is_a_noop() {
    let owner = owner(50);
    let device = device(owner.id);
    let reading = reading(device.id, 75);

    // The existence check misses, then the conflict-tolerant insert
    // returns no row: a concurrent evaluation already recorded the alert.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owner]])
        .append_query_results([Vec::<alert_logs::Model>::new()])
        .append_query_results([Vec::<alert_logs::Model>::new()])
        .into_connection();
    let state = state_with(db);

    let result = evaluate(&state, &device, &reading).await.unwrap();
    assert_eq!(result, None);
}

#[test]
fn bulk_semaphore_is_sized_from_config() {
    let mut config = test_config();
    config.bulk_concurrent_limit = 3;
    let notifier = NotifierClient::new(&config);
    let state = AppState::new(DatabaseConnection::default(), config, notifier);

    assert_eq!(state.bulk_semaphore.available_permits(), 3);
}
