use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Device-facing authentication failures are deliberately undifferentiated:
/// unknown identifier, wrong credential, and deactivated device all produce
/// this exact message so identifiers cannot be enumerated.
pub const UNAUTHENTICATED_MESSAGE: &str = "Invalid device identifier or credential";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("{UNAUTHENTICATED_MESSAGE}")]
    Unauthenticated,

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Database(e) => {
                tracing::error!("Database error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error" }),
                )
            }
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": UNAUTHENTICATED_MESSAGE }),
            ),
            Self::Validation(fields) => {
                let details: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|f| (f.field.to_string(), json!(f.message)))
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": "Validation failed", "fields": details }),
                )
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Self::Delivery(msg) => {
                // Operator-facing only; ingestion never returns this variant
                // to a device, so reaching here means a programming error.
                tracing::error!("Delivery error surfaced to HTTP layer: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Notification delivery failed" }),
                )
            }
            Self::Config(e) => {
                tracing::error!("Config error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Configuration error" }),
                )
            }
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": msg }))
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
