use axum::{
    extract::{Path, Query, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::{devices, readings};
use crate::error::{AppError, AppResult};
use crate::routes::{resolve_owner, resolve_window};

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadingResponse {
    pub id: Uuid,
    pub device_id: Uuid,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: Option<f64>,
    pub pest_count_primary: i32,
    pub pest_count_secondary: i32,
    pub rainfall_detected: bool,
    pub irrigation_active: bool,
    pub model_confidence: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl From<&readings::Model> for ReadingResponse {
    fn from(r: &readings::Model) -> Self {
        Self {
            id: r.id,
            device_id: r.device_id,
            observed_at: r.observed_at.with_timezone(&Utc),
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            pest_count_primary: r.pest_count_primary,
            pest_count_secondary: r.pest_count_secondary,
            rainfall_detected: r.rainfall_detected,
            irrigation_active: r.irrigation_active,
            model_confidence: r.model_confidence,
            recorded_at: r.recorded_at.with_timezone(&Utc),
        }
    }
}

pub fn determine_format(query_format: &str, headers: &HeaderMap) -> String {
    // Query parameter takes precedence
    if query_format != "json" {
        return query_format.to_lowercase();
    }

    // Check Accept header
    if let Some(accept) = headers.get(header::ACCEPT)
        && let Ok(accept_str) = accept.to_str()
    {
        if accept_str.contains("application/x-ndjson") {
            return "ndjson".to_string();
        }
        if accept_str.contains("text/csv") {
            return "csv".to_string();
        }
    }

    "json".to_string()
}

const CSV_HEADER: &str = "observed_at,device_id,temperature,humidity,soil_moisture,\
pest_count_primary,pest_count_secondary,rainfall_detected,irrigation_active,\
model_confidence,recorded_at\n";

fn csv_row(r: &ReadingResponse) -> String {
    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}\n",
        r.observed_at.to_rfc3339(),
        r.device_id,
        r.temperature,
        r.humidity,
        opt(r.soil_moisture),
        r.pest_count_primary,
        r.pest_count_secondary,
        r.rainfall_detected,
        r.irrigation_active,
        opt(r.model_confidence),
        r.recorded_at.to_rfc3339(),
    )
}

fn build_csv_response(rows: Vec<ReadingResponse>) -> AppResult<Response> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, std::io::Error>>(100);

    tokio::spawn(async move {
        let _ = tx.send(Ok(CSV_HEADER.to_string())).await;
        for row in &rows {
            if tx.send(Ok(csv_row(row))).await.is_err() {
                break;
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    let body = axum::body::Body::from_stream(stream);

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn build_ndjson_response(rows: Vec<ReadingResponse>) -> AppResult<Response> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, std::io::Error>>(100);

    tokio::spawn(async move {
        for row in &rows {
            let Ok(line) = serde_json::to_string(row) else {
                break;
            };
            if tx.send(Ok(format!("{line}\n"))).await.is_err() {
                break;
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    let body = axum::body::Body::from_stream(stream);

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-ndjson"),
        )
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OwnerReadingsQuery {
    /// Filter by device identifier
    pub device: Option<String>,
    /// Start bound (RFC 3339 timestamp or YYYY-MM-DD date, inclusive)
    pub start: Option<String>,
    /// End bound (RFC 3339 timestamp or YYYY-MM-DD date, inclusive)
    pub end: Option<String>,
    /// Response format: json (default), ndjson, csv
    #[serde(default = "default_format")]
    pub format: String,
}

/// List readings across an owner's devices
///
/// Newest-first, optionally filtered by device identifier and time range.
/// Supports JSON, CSV, and NDJSON formats.
#[utoipa::path(
    get,
    path = "/api/owners/{owner_id}/readings",
    params(
        ("owner_id" = Uuid, Path, description = "Owner UUID"),
        OwnerReadingsQuery
    ),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = Vec<ReadingResponse>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Owner not found"),
    ),
    tag = "readings"
)]
pub async fn list_owner_readings(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(query): Query<OwnerReadingsQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let owner = resolve_owner(&state.db, owner_id).await?;

    // Unlike the dashboard summary, the raw list has no default window;
    // absent bounds mean the full history.
    let window = resolve_window(query.start.as_deref(), query.end.as_deref(), None)?;

    let mut device_query = devices::Entity::find().filter(devices::Column::OwnerId.eq(owner.id));
    if let Some(ref identifier) = query.device {
        device_query = device_query.filter(devices::Column::DeviceIdentifier.eq(identifier));
    }
    let device_ids: Vec<Uuid> = device_query
        .all(&state.db)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    let format = determine_format(&query.format, &headers);

    // Bulk formats acquire the semaphore to bound concurrent exports
    let _permit = if format == "csv" || format == "ndjson" {
        match state.bulk_semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(
                    format = %format,
                    status = StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    "bulk_request_rejected"
                );
                return Err(AppError::ServiceUnavailable(
                    "Too many concurrent bulk requests. Please try again later.".to_string(),
                ));
            }
        }
    } else {
        None
    };

    let mut readings_query =
        readings::Entity::find().filter(readings::Column::DeviceId.is_in(device_ids));
    if let Some(start) = window.start {
        readings_query = readings_query.filter(readings::Column::ObservedAt.gte(start));
    }
    if let Some(end) = window.end {
        readings_query = readings_query.filter(readings::Column::ObservedAt.lte(end));
    }

    let rows: Vec<ReadingResponse> = readings_query
        .order_by_desc(readings::Column::ObservedAt)
        .all(&state.db)
        .await?
        .iter()
        .map(ReadingResponse::from)
        .collect();

    match format.as_str() {
        "csv" => build_csv_response(rows),
        "ndjson" => build_ndjson_response(rows),
        _ => Ok(Json(rows).into_response()),
    }
}
