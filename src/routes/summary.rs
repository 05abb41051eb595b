use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::alert::is_breach;
use crate::common::AppState;
use crate::entity::{devices, readings};
use crate::error::{AppError, AppResult};
use crate::routes::readings::ReadingResponse;
use crate::routes::{resolve_owner, resolve_window};

/// Cap on the readings returned in `sensor_data`, whatever the window size.
pub const SENSOR_DATA_CAP: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Window start (RFC 3339 timestamp or YYYY-MM-DD date, inclusive)
    pub start: Option<String>,
    /// Window end (RFC 3339 timestamp or YYYY-MM-DD date, inclusive)
    pub end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    /// Windowed readings, newest-first, capped at 100
    pub sensor_data: Vec<ReadingResponse>,
    pub summary: SummaryStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryStats {
    /// All owned devices, window-independent
    pub total_devices: u64,
    /// Owned devices with a reading in the trailing 24h from now,
    /// independent of the requested window
    pub active_devices: u64,
    /// Windowed readings whose primary count exceeds the current threshold
    pub recent_alerts: u64,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub max_pest_count: i32,
    /// Most recent reading per device, keyed by device display name;
    /// devices with no readings are omitted
    pub latest_data: BTreeMap<String, LatestReading>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LatestReading {
    pub timestamp: DateTime<Utc>,
    pub pest_count_primary: i32,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub max_pest_count: i32,
    pub recent_alerts: u64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Aggregate the windowed readings. Averages are rounded to one decimal;
/// an empty window yields zeroes, not nulls.
///
/// `recent_alerts` is recomputed against the threshold passed in (the
/// owner's current one), so it may diverge from the persisted alert log
/// when the threshold changed after ingestion. That divergence is
/// intentional.
#[must_use]
pub fn compute_window_stats(rows: &[readings::Model], threshold: i32) -> WindowStats {
    if rows.is_empty() {
        return WindowStats {
            avg_temperature: 0.0,
            avg_humidity: 0.0,
            max_pest_count: 0,
            recent_alerts: 0,
        };
    }

    let n = rows.len() as f64;
    let avg_temperature = round1(rows.iter().map(|r| r.temperature).sum::<f64>() / n);
    let avg_humidity = round1(rows.iter().map(|r| r.humidity).sum::<f64>() / n);
    let max_pest_count = rows
        .iter()
        .map(|r| r.pest_count_primary)
        .max()
        .unwrap_or(0);
    let recent_alerts = rows
        .iter()
        .filter(|r| is_breach(r.pest_count_primary, threshold))
        .count() as u64;

    WindowStats {
        avg_temperature,
        avg_humidity,
        max_pest_count,
        recent_alerts,
    }
}

/// Project windowed rows into the `sensor_data` list, preserving order
/// and capping at [`SENSOR_DATA_CAP`].
#[must_use]
pub fn project_sensor_data(rows: &[readings::Model]) -> Vec<ReadingResponse> {
    rows.iter()
        .take(SENSOR_DATA_CAP)
        .map(ReadingResponse::from)
        .collect()
}

/// Dashboard summary for an owner
///
/// Windowed aggregate statistics over all of the owner's devices, plus the
/// 100 most recent readings in the window. The window defaults to the
/// trailing 24 hours.
#[utoipa::path(
    get,
    path = "/api/owners/{owner_id}/summary",
    params(
        ("owner_id" = Uuid, Path, description = "Owner UUID"),
        SummaryQuery
    ),
    responses(
        (status = 200, description = "Summary computed successfully", body = SummaryResponse),
        (status = 400, description = "Invalid window bounds"),
        (status = 404, description = "Owner not found"),
    ),
    tag = "dashboard"
)]
pub async fn owner_summary(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<SummaryResponse>> {
    let timeout = Duration::from_secs(state.config.summary_timeout_seconds);
    match tokio::time::timeout(timeout, build_summary(&state, owner_id, &query)).await {
        Ok(result) => result.map(Json),
        Err(_) => {
            tracing::error!(owner_id = %owner_id, "summary_timeout");
            Err(AppError::ServiceUnavailable(
                "Summary query timed out".to_string(),
            ))
        }
    }
}

async fn build_summary(
    state: &AppState,
    owner_id: Uuid,
    query: &SummaryQuery,
) -> AppResult<SummaryResponse> {
    let owner = resolve_owner(&state.db, owner_id).await?;

    let now = Utc::now();
    let window = resolve_window(query.start.as_deref(), query.end.as_deref(), Some(now))?;

    let device_list = devices::Entity::find()
        .filter(devices::Column::OwnerId.eq(owner.id))
        .all(&state.db)
        .await?;
    let device_ids: Vec<Uuid> = device_list.iter().map(|d| d.id).collect();
    let total_devices = device_list.len() as u64;

    let mut readings_query =
        readings::Entity::find().filter(readings::Column::DeviceId.is_in(device_ids.clone()));
    if let Some(start) = window.start {
        readings_query = readings_query.filter(readings::Column::ObservedAt.gte(start));
    }
    if let Some(end) = window.end {
        readings_query = readings_query.filter(readings::Column::ObservedAt.lte(end));
    }
    let windowed = readings_query
        .order_by_desc(readings::Column::ObservedAt)
        .all(&state.db)
        .await?;

    let stats = compute_window_stats(&windowed, owner.alert_threshold);

    // Active devices are always measured against the trailing 24h from
    // now, not against the requested window.
    let active_since = now - ChronoDuration::hours(24);
    let active_device_ids: Vec<Uuid> = readings::Entity::find()
        .select_only()
        .column(readings::Column::DeviceId)
        .filter(readings::Column::DeviceId.is_in(device_ids))
        .filter(readings::Column::ObservedAt.gte(active_since))
        .distinct()
        .into_tuple()
        .all(&state.db)
        .await?;
    let active_devices = active_device_ids.len() as u64;

    // Latest reading per device, regardless of window. BTreeMap keeps the
    // serialized output identical across repeated calls.
    let mut latest_data = BTreeMap::new();
    for device in &device_list {
        let latest = readings::Entity::find()
            .filter(readings::Column::DeviceId.eq(device.id))
            .order_by_desc(readings::Column::ObservedAt)
            .one(&state.db)
            .await?;
        if let Some(r) = latest {
            latest_data.insert(
                device.display_name.clone(),
                LatestReading {
                    timestamp: r.observed_at.with_timezone(&Utc),
                    pest_count_primary: r.pest_count_primary,
                    temperature: r.temperature,
                    humidity: r.humidity,
                },
            );
        }
    }

    let sensor_data = project_sensor_data(&windowed);

    Ok(SummaryResponse {
        sensor_data,
        summary: SummaryStats {
            total_devices,
            active_devices,
            recent_alerts: stats.recent_alerts,
            avg_temperature: stats.avg_temperature,
            avg_humidity: stats.avg_humidity,
            max_pest_count: stats.max_pest_count,
            latest_data,
        },
    })
}
