use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::AppState;
use crate::error::{AppError, AppResult, FieldError};
use crate::routes::resolve_owner;

#[derive(Debug, Serialize, ToSchema)]
pub struct OwnerResponse {
    pub id: Uuid,
    pub display_name: String,
    pub contact_email: String,
    pub alert_threshold: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<crate::entity::owners::Model> for OwnerResponse {
    fn from(o: crate::entity::owners::Model) -> Self {
        Self {
            id: o.id,
            display_name: o.display_name,
            contact_email: o.contact_email,
            alert_threshold: o.alert_threshold,
            created_at: o.created_at.map(|t| t.with_timezone(&Utc)),
            updated_at: o.updated_at.map(|t| t.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOwnerRequest {
    pub display_name: Option<String>,
    pub contact_email: Option<String>,
    pub alert_threshold: Option<i32>,
}

/// Get an owner profile
#[utoipa::path(
    get,
    path = "/api/owners/{owner_id}",
    params(
        ("owner_id" = Uuid, Path, description = "Owner UUID"),
    ),
    responses(
        (status = 200, description = "Owner retrieved successfully", body = OwnerResponse),
        (status = 404, description = "Owner not found"),
    ),
    tag = "owners"
)]
pub async fn get_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> AppResult<Json<OwnerResponse>> {
    let owner = resolve_owner(&state.db, owner_id).await?;
    Ok(Json(owner.into()))
}

/// Update an owner profile
///
/// Partial update; this is the only mutation path for `alert_threshold`.
/// Threshold changes take effect for all subsequent alert evaluations and
/// dashboard alert counts.
#[utoipa::path(
    put,
    path = "/api/owners/{owner_id}",
    request_body = UpdateOwnerRequest,
    params(
        ("owner_id" = Uuid, Path, description = "Owner UUID"),
    ),
    responses(
        (status = 200, description = "Owner updated successfully", body = OwnerResponse),
        (status = 400, description = "Invalid field values"),
        (status = 404, description = "Owner not found"),
    ),
    tag = "owners"
)]
pub async fn update_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    Json(request): Json<UpdateOwnerRequest>,
) -> AppResult<Json<OwnerResponse>> {
    let owner = resolve_owner(&state.db, owner_id).await?;

    if let Some(threshold) = request.alert_threshold
        && threshold < 0
    {
        return Err(AppError::Validation(vec![FieldError::new(
            "alert_threshold",
            "must be a non-negative integer",
        )]));
    }

    let mut active = owner.into_active_model();
    if let Some(display_name) = request.display_name {
        active.display_name = Set(display_name);
    }
    if let Some(contact_email) = request.contact_email {
        active.contact_email = Set(contact_email);
    }
    if let Some(threshold) = request.alert_threshold {
        active.alert_threshold = Set(threshold);
    }
    active.updated_at = Set(Some(Utc::now().into()));

    let updated = active.update(&state.db).await?;

    tracing::info!(owner_id = %updated.id, threshold = updated.alert_threshold, "owner_profile_updated");

    Ok(Json(updated.into()))
}
