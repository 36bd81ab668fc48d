//! Webhook fan-out leg (§4.8 step 2): posts the confirmed-payment payload
//! to a merchant-configured URL, grounded on the same reqwest-JSON-POST
//! idiom the Ledger Client Adapter and the teacher's Jito bundle submission
//! both use for outbound HTTP calls.

use reqwest::Client;
use tracing::{instrument, warn};

use crate::domain::{PaymentError, WebhookPayload};

pub struct WebhookSender {
    http_client: Client,
    webhook_url: Option<String>,
}

impl WebhookSender {
    #[must_use]
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            webhook_url,
        }
    }

    /// Posts `{event, payload}` to the configured URL. A no-op (`Ok(())`)
    /// when no URL is configured, since the webhook leg is optional per
    /// merchant (§1 "Non-goals").
    #[instrument(skip(self, payload))]
    pub async fn send(&self, event: &str, payload: &WebhookPayload) -> Result<(), PaymentError> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let body = serde_json::json!({ "event": event, "data": payload });

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::ExternalNotifierFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "webhook endpoint rejected delivery");
            return Err(PaymentError::ExternalNotifierFailed {
                message: format!("webhook endpoint returned {}", response.status()),
            });
        }

        Ok(())
    }
}
