use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Client for the outbound notification gateway. The gateway owns the
/// actual email/SMS transport; this client only submits messages.
pub struct NotifierClient {
    http_client: Client,
    base_url: String,
    bearer_token: String,
    from_address: String,
}

impl NotifierClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(config.notifier_skip_tls_verify)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: config.notifier_base_url.clone(),
            bearer_token: config.notifier_bearer_token.clone(),
            from_address: config.notifier_from_address.clone(),
        }
    }

    /// Submit one message to the gateway.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delivery` if the request fails or the gateway
    /// returns an error status. Callers on the ingestion path must log
    /// this error, never propagate it into a device-facing response.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let url = format!("{}/messages", self.base_url);

        let request = MessageRequest {
            from: &self.from_address,
            to,
            subject,
            body,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("Request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Delivery("Rate limited (429)".to_string()));
        }

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(())
    }
}
