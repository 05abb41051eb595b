use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::{alert_logs, devices, readings};
use crate::error::AppResult;
use crate::routes::resolve_owner;

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertResponse {
    pub id: Uuid,
    pub reading_id: Uuid,
    pub alert_kind: String,
    pub message: String,
    pub dispatched_to: String,
    pub dispatched_at: DateTime<Utc>,
}

/// List dispatched alerts for an owner's devices
///
/// Newest-first over the append-only alert log.
#[utoipa::path(
    get,
    path = "/api/owners/{owner_id}/alerts",
    params(
        ("owner_id" = Uuid, Path, description = "Owner UUID"),
    ),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = Vec<AlertResponse>),
        (status = 404, description = "Owner not found"),
    ),
    tag = "alerts"
)]
pub async fn list_owner_alerts(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> AppResult<Json<Vec<AlertResponse>>> {
    let owner = resolve_owner(&state.db, owner_id).await?;

    let device_ids: Vec<Uuid> = devices::Entity::find()
        .filter(devices::Column::OwnerId.eq(owner.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    let alerts_list = alert_logs::Entity::find()
        .join(JoinType::InnerJoin, alert_logs::Relation::Reading.def())
        .filter(readings::Column::DeviceId.is_in(device_ids))
        .order_by_desc(alert_logs::Column::DispatchedAt)
        .all(&state.db)
        .await?;

    let response: Vec<AlertResponse> = alerts_list
        .into_iter()
        .map(|a| AlertResponse {
            id: a.id,
            reading_id: a.reading_id,
            alert_kind: a.alert_kind,
            message: a.message,
            dispatched_to: a.dispatched_to,
            dispatched_at: a.dispatched_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(response))
}
