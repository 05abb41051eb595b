//! Unit tests for device authentication over a mocked database.
//!
//! Run with: cargo test --test auth_unit_test

use sea_orm::{DatabaseBackend, MockDatabase};
use uuid::Uuid;

use pestwatch::entity::devices;
use pestwatch::error::{AppError, UNAUTHENTICATED_MESSAGE};
use pestwatch::routes::ingest::authenticate;

fn device() -> devices::Model {
    devices::Model {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        device_identifier: "trap-north-01".to_string(),
        credential: "secret".to_string(),
        display_name: "North Field Trap".to_string(),
        location: None,
        active: true,
        created_at: None,
        updated_at: None,
    }
}

#[tokio::test]
async fn matching_active_device_authenticates() {
    let device = device();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![device.clone()]])
        .into_connection();

    let found = authenticate(&db, "trap-north-01", "secret").await.unwrap();
    assert_eq!(found.id, device.id);
}

#[tokio::test]
async fn all_rejection_causes_are_indistinguishable() {
    // Unknown identifier, wrong credential, and a deactivated device all
    // miss the same single lookup and must produce the identical error.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([
            Vec::<devices::Model>::new(),
            Vec::<devices::Model>::new(),
            Vec::<devices::Model>::new(),
        ])
        .into_connection();

    let unknown = authenticate(&db, "no-such-device", "secret")
        .await
        .unwrap_err();
    let wrong_credential = authenticate(&db, "trap-north-01", "wrong")
        .await
        .unwrap_err();
    let deactivated = authenticate(&db, "trap-retired-07", "secret")
        .await
        .unwrap_err();

    for err in [unknown, wrong_credential, deactivated] {
        assert!(matches!(err, AppError::Unauthenticated));
        assert_eq!(err.to_string(), UNAUTHENTICATED_MESSAGE);
    }
}
