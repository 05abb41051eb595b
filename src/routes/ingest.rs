use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::alert;
use crate::common::AppState;
use crate::entity::{devices, readings};
use crate::error::{AppError, AppResult, FieldError};

/// Validated submission payload, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub observed_at: Option<DateTime<FixedOffset>>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: Option<f64>,
    pub pest_count_primary: i32,
    pub pest_count_secondary: i32,
    pub rainfall_detected: bool,
    pub irrigation_active: bool,
    pub model_confidence: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub reading_id: Uuid,
    pub observed_at: DateTime<Utc>,
}

/// Pull the device credential out of the Authorization header. Devices may
/// send the raw token or prefix it with `Bearer `. The remainder is used
/// verbatim; surrounding whitespace is part of the credential.
#[must_use]
pub fn extract_credential(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
    if token.is_empty() { None } else { Some(token) }
}

/// Match identifier, credential, and active flag in a single lookup.
///
/// # Errors
///
/// Returns `AppError::Unauthenticated` for unknown identifier, wrong
/// credential, and deactivated device alike; the three cases are
/// indistinguishable to the caller. No side effects.
pub async fn authenticate(
    db: &DatabaseConnection,
    device_identifier: &str,
    credential: &str,
) -> AppResult<devices::Model> {
    let device = devices::Entity::find()
        .filter(devices::Column::DeviceIdentifier.eq(device_identifier))
        .filter(devices::Column::Credential.eq(credential))
        .filter(devices::Column::Active.eq(true))
        .one(db)
        .await?;

    match device {
        Some(d) => Ok(d),
        None => {
            // Operator detail stays in the log; the response is the same
            // regardless of which condition failed.
            tracing::debug!(device = %device_identifier, "device_authentication_rejected");
            Err(AppError::Unauthenticated)
        }
    }
}

fn required_f64(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> f64 {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => {
            errors.push(FieldError::new(field, "is required"));
            0.0
        }
        Some(v) => match v.as_f64() {
            Some(n) => n,
            None => {
                errors.push(FieldError::new(field, "must be a number"));
                0.0
            }
        },
    }
}

fn optional_f64(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_f64() {
            Some(n) => Some(n),
            None => {
                errors.push(FieldError::new(field, "must be a number"));
                None
            }
        },
    }
}

fn count_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> i32 {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => 0,
        Some(v) => match v.as_i64() {
            Some(n) if (0..=i64::from(i32::MAX)).contains(&n) => n as i32,
            _ => {
                errors.push(FieldError::new(field, "must be a non-negative integer"));
                0
            }
        },
    }
}

fn flag_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> bool {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => false,
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => {
                errors.push(FieldError::new(field, "must be a boolean"));
                false
            }
        },
    }
}

/// Validate a raw submission body field by field.
///
/// Absent optional fields take their defaults; a *malformed* present field
/// rejects the whole submission. In particular a malformed `observed_at`
/// is an error, never silently replaced with "now".
///
/// # Errors
///
/// Returns every field failure found, for a 400 response with per-field
/// detail.
pub fn parse_payload(payload: &serde_json::Value) -> Result<NewReading, Vec<FieldError>> {
    let Some(obj) = payload.as_object() else {
        return Err(vec![FieldError::new("body", "must be a JSON object")]);
    };

    let mut errors = Vec::new();

    let temperature = required_f64(obj, "temperature", &mut errors);
    let humidity = required_f64(obj, "humidity", &mut errors);
    let soil_moisture = optional_f64(obj, "soil_moisture", &mut errors);
    let model_confidence = optional_f64(obj, "model_confidence", &mut errors);
    let pest_count_primary = count_field(obj, "pest_count_primary", &mut errors);
    let pest_count_secondary = count_field(obj, "pest_count_secondary", &mut errors);
    let rainfall_detected = flag_field(obj, "rainfall_detected", &mut errors);
    let irrigation_active = flag_field(obj, "irrigation_active", &mut errors);

    let observed_at = match obj.get("observed_at") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_str().map(DateTime::parse_from_rfc3339) {
            Some(Ok(t)) => Some(t),
            _ => {
                errors.push(FieldError::new(
                    "observed_at",
                    "must be an RFC 3339 timestamp",
                ));
                None
            }
        },
    };

    if errors.is_empty() {
        Ok(NewReading {
            observed_at,
            temperature,
            humidity,
            soil_moisture,
            pest_count_primary,
            pest_count_secondary,
            rainfall_detected,
            irrigation_active,
            model_confidence,
        })
    } else {
        Err(errors)
    }
}

/// Submit a telemetry reading for a device
///
/// Authenticated by the device credential in the Authorization header.
/// Alert evaluation runs before the response is issued; notification
/// delivery does not.
#[utoipa::path(
    post,
    path = "/api/devices/{device_identifier}/readings",
    params(
        ("device_identifier" = String, Path, description = "Opaque device identifier"),
    ),
    responses(
        (status = 201, description = "Reading persisted", body = SubmitResponse),
        (status = 400, description = "Validation failed, field detail in body"),
        (status = 401, description = "Unknown identifier, bad credential, or inactive device"),
    ),
    tag = "ingestion"
)]
pub async fn submit_reading(
    State(state): State<AppState>,
    Path(device_identifier): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    let credential = extract_credential(&headers).ok_or(AppError::Unauthenticated)?;
    let device = authenticate(&state.db, &device_identifier, credential).await?;

    let new_reading = parse_payload(&payload).map_err(AppError::Validation)?;

    let timeout = Duration::from_secs(state.config.ingest_timeout_seconds);
    let reading = match tokio::time::timeout(
        timeout,
        persist_and_evaluate(&state, &device, new_reading),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            tracing::error!(device = %device.device_identifier, "ingest_timeout");
            return Err(AppError::ServiceUnavailable(
                "Submission timed out, please retry".to_string(),
            ));
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            reading_id: reading.id,
            observed_at: reading.observed_at.with_timezone(&Utc),
        }),
    ))
}

async fn persist_and_evaluate(
    state: &AppState,
    device: &devices::Model,
    new_reading: NewReading,
) -> AppResult<readings::Model> {
    let now = Utc::now();
    let observed_at = new_reading
        .observed_at
        .unwrap_or_else(|| now.fixed_offset());

    let model = readings::ActiveModel {
        id: Set(Uuid::new_v4()),
        device_id: Set(device.id),
        observed_at: Set(observed_at),
        temperature: Set(new_reading.temperature),
        humidity: Set(new_reading.humidity),
        soil_moisture: Set(new_reading.soil_moisture),
        pest_count_primary: Set(new_reading.pest_count_primary),
        pest_count_secondary: Set(new_reading.pest_count_secondary),
        rainfall_detected: Set(new_reading.rainfall_detected),
        irrigation_active: Set(new_reading.irrigation_active),
        model_confidence: Set(new_reading.model_confidence),
        recorded_at: Set(now.into()),
    };

    let reading = model.insert(&state.db).await?;

    tracing::debug!(
        reading_id = %reading.id,
        device = %device.device_identifier,
        "reading_persisted"
    );

    // Evaluation is attempted before the success response goes out, but a
    // failure here never un-acknowledges the persisted reading.
    if let Err(e) = alert::evaluate(state, device, &reading).await {
        tracing::error!(reading_id = %reading.id, error = %e, "alert_evaluation_failed");
    }

    Ok(reading)
}
