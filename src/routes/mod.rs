pub mod alerts;
pub mod health;
pub mod ingest;
pub mod owners;
mod rate_limit;
pub mod readings;
pub mod summary;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use uuid::Uuid;

use rate_limit::FallbackIpKeyExtractor;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::entity::owners as owner_entity;
use crate::error::{AppError, AppResult};

/// Look up an owner by UUID
pub async fn resolve_owner(
    db: &DatabaseConnection,
    owner_id: Uuid,
) -> AppResult<owner_entity::Model> {
    owner_entity::Entity::find_by_id(owner_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Owner '{owner_id}' not found")))
}

/// Resolved query window. `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

fn parse_bound(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }

    // Bare dates are inclusive by date: a start bound opens the day, an
    // end bound closes it.
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let naive = if end_of_day {
        date.and_hms_micro_opt(23, 59, 59, 999_999)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&naive))
}

/// Resolve raw `start`/`end` query parameters into a window.
///
/// When both bounds are absent and `default_trailing_from` is given, the
/// window is the trailing 24 hours from that instant; with no default the
/// window is unbounded.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for unparseable bounds or an end before
/// the start.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    default_trailing_from: Option<DateTime<Utc>>,
) -> AppResult<Window> {
    if start.is_none() && end.is_none() {
        return Ok(Window {
            start: default_trailing_from.map(|now| now - Duration::hours(24)),
            end: None,
        });
    }

    let start = match start {
        Some(v) => Some(parse_bound(v, false).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid start '{v}': expected an RFC 3339 timestamp or YYYY-MM-DD date"
            ))
        })?),
        None => None,
    };
    let end = match end {
        Some(v) => Some(parse_bound(v, true).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid end '{v}': expected an RFC 3339 timestamp or YYYY-MM-DD date"
            ))
        })?),
        None => None,
    };

    if let (Some(s), Some(e)) = (start, end)
        && e < s
    {
        return Err(AppError::BadRequest(
            "end must not be before start".to_string(),
        ));
    }

    Ok(Window { start, end })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        ingest::submit_reading,
        summary::owner_summary,
        readings::list_owner_readings,
        alerts::list_owner_alerts,
        owners::get_owner,
        owners::update_owner,
    ),
    components(
        schemas(
            ingest::SubmitResponse,
            summary::SummaryResponse,
            summary::SummaryStats,
            summary::LatestReading,
            readings::ReadingResponse,
            alerts::AlertResponse,
            owners::OwnerResponse,
            owners::UpdateOwnerRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "ingestion", description = "Device telemetry submission"),
        (name = "dashboard", description = "Windowed summary statistics"),
        (name = "readings", description = "Raw reading history"),
        (name = "alerts", description = "Dispatched alert log"),
        (name = "owners", description = "Owner profiles and thresholds"),
    ),
    info(
        title = "Pestwatch API",
        description = "Telemetry ingestion and threshold-alerting API for field pest monitors",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            metadata_rate = %format!("{}/s burst {}", config.rate_limit_metadata_per_second, config.rate_limit_metadata_burst),
            data_rate = %format!("{}/s burst {}", config.rate_limit_data_per_second, config.rate_limit_data_burst),
            bulk_concurrent = config.bulk_concurrent_limit,
            "Rate limiting configured"
        );
    }

    // Owner-facing routes; throttled at the metadata rate
    let metadata_routes_base = Router::new()
        .route(
            "/owners/{owner_id}",
            get(owners::get_owner).put(owners::update_owner),
        )
        .route("/owners/{owner_id}/summary", get(summary::owner_summary))
        .route(
            "/owners/{owner_id}/readings",
            get(readings::list_owner_readings),
        )
        .route("/owners/{owner_id}/alerts", get(alerts::list_owner_alerts));

    // Device ingestion; throttled at the (higher) data rate
    let data_routes_base = Router::new().route(
        "/devices/{device_identifier}/readings",
        post(ingest::submit_reading),
    );

    // Combine API routes, conditionally applying rate limiting
    let api_routes = if config.disable_rate_limiting {
        Router::new()
            .merge(metadata_routes_base)
            .merge(data_routes_base)
    } else {
        let metadata_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_metadata_per_second)
            .burst_size(config.rate_limit_metadata_burst)
            .finish()
            .expect("Failed to create metadata rate limiter");

        let data_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_data_per_second)
            .burst_size(config.rate_limit_data_burst)
            .finish()
            .expect("Failed to create data rate limiter");

        Router::new()
            .merge(metadata_routes_base.layer(GovernorLayer {
                config: Arc::new(metadata_limiter),
            }))
            .merge(data_routes_base.layer(GovernorLayer {
                config: Arc::new(data_limiter),
            }))
    }
    .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
