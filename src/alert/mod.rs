use chrono::Utc;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::{alert_logs, devices, owners, readings};
use crate::error::{AppError, AppResult};
use crate::notifier::NotifierClient;

pub const ALERT_KIND_THRESHOLD: &str = "threshold";

/// Breach condition: strictly greater than the threshold. A count equal
/// to the threshold is not a breach.
#[must_use]
pub fn is_breach(pest_count_primary: i32, threshold: i32) -> bool {
    pest_count_primary > threshold
}

#[must_use]
pub fn render_subject(device_name: &str) -> String {
    format!("Pest alert: high count detected - {device_name}")
}

/// Render the notification body from the triggering reading. Mirrors the
/// fields an owner needs to act without opening the dashboard.
#[must_use]
pub fn render_alert_message(
    owner: &owners::Model,
    device: &devices::Model,
    reading: &readings::Model,
) -> String {
    let location = device.location.as_deref().unwrap_or("Not specified");

    format!(
        "Dear {},\n\n\
         Your monitoring device \"{}\" has detected an unusually high pest count.\n\n\
         Alert details:\n\
         - Device: {}\n\
         - Location: {}\n\
         - Primary pest count: {}\n\
         - Secondary pest count: {}\n\
         - Threshold: {}\n\
         - Temperature: {}\u{b0}C\n\
         - Humidity: {}%\n\
         - Time: {}\n\n\
         Please check your field and take necessary action if required.\n",
        owner.display_name,
        device.display_name,
        device.display_name,
        location,
        reading.pest_count_primary,
        reading.pest_count_secondary,
        owner.alert_threshold,
        reading.temperature,
        reading.humidity,
        reading.observed_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Evaluate a freshly persisted reading against the owner's current
/// threshold. On breach, persist the alert record and hand the rendered
/// message off to a spawned dispatch task; the caller never waits on
/// delivery. Returns the alert id when a new alert was recorded.
///
/// Re-evaluating an already-alerted reading is a no-op: the existence
/// check catches client retries, and the unique index on
/// `alert_logs.reading_id` closes the race between concurrent duplicates.
///
/// # Errors
///
/// Returns `AppError::Database` on storage failures and
/// `AppError::NotFound` when the owning account has vanished.
pub async fn evaluate(
    state: &AppState,
    device: &devices::Model,
    reading: &readings::Model,
) -> AppResult<Option<Uuid>> {
    // Threshold is read at evaluation time, not submission time; an owner
    // may have changed it since the previous reading.
    let owner = owners::Entity::find_by_id(device.owner_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Owner for device '{}' not found",
                device.device_identifier
            ))
        })?;

    if !is_breach(reading.pest_count_primary, owner.alert_threshold) {
        return Ok(None);
    }

    let already_alerted = alert_logs::Entity::find()
        .filter(alert_logs::Column::ReadingId.eq(reading.id))
        .one(&state.db)
        .await?
        .is_some();
    if already_alerted {
        tracing::debug!(reading_id = %reading.id, "alert_already_recorded");
        return Ok(None);
    }

    let message = render_alert_message(&owner, device, reading);
    let alert = alert_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        reading_id: Set(reading.id),
        alert_kind: Set(ALERT_KIND_THRESHOLD.to_string()),
        message: Set(message.clone()),
        dispatched_to: Set(owner.contact_email.clone()),
        dispatched_at: Set(Utc::now().into()),
    };

    let insert = alert_logs::Entity::insert(alert)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(alert_logs::Column::ReadingId)
                .do_nothing()
                .to_owned(),
        )
        .exec(&state.db)
        .await;

    let alert_id = match insert {
        Ok(res) => res.last_insert_id,
        // Lost the race against a concurrent duplicate submission; the
        // reading is already alerted.
        Err(DbErr::RecordNotInserted) => {
            tracing::debug!(reading_id = %reading.id, "alert_insert_conflict");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        alert_id = %alert_id,
        reading_id = %reading.id,
        device = %device.device_identifier,
        pest_count = reading.pest_count_primary,
        threshold = owner.alert_threshold,
        "alert_recorded"
    );

    // The mandatory asynchrony boundary: the alert row is durable before
    // any delivery attempt, and the HTTP response never waits on it.
    let notifier = Arc::clone(&state.notifier);
    let retry_max = state.config.notify_retry_max;
    let retry_delay = state.config.notify_retry_delay_seconds;
    let recipient = owner.contact_email;
    let subject = render_subject(&device.display_name);
    tokio::spawn(async move {
        dispatch(notifier, retry_max, retry_delay, &recipient, &subject, &message).await;
    });

    Ok(Some(alert_id))
}

/// Deliver one notification with retry/backoff. Failures degrade alerting
/// silently: they are logged for operators and the alert row stays put
/// for later audit or resend.
async fn dispatch(
    notifier: Arc<NotifierClient>,
    retry_max: u32,
    retry_delay_seconds: u64,
    to: &str,
    subject: &str,
    body: &str,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match notifier.send(to, subject, body).await {
            Ok(()) => {
                tracing::info!(recipient = %to, attempt, "alert_notification_delivered");
                return;
            }
            Err(e) if attempt <= retry_max => {
                tracing::warn!(recipient = %to, attempt, error = %e, "alert_notification_retry");
                tokio::time::sleep(Duration::from_secs(retry_delay_seconds)).await;
            }
            Err(e) => {
                tracing::error!(
                    recipient = %to,
                    attempts = attempt,
                    error = %e,
                    "alert_notification_failed"
                );
                return;
            }
        }
    }
}
