//! WhatsApp gateway client
//!
//! The delivery microservice owns sessions and QR pairing; this side only
//! relays digests: `POST {base}/send` with `{to, message}`.

use std::time::Duration;

use lendcase_core::error::{CaseError, Result};
use serde::Deserialize;
use tracing::debug;

use super::EndpointPacer;

const ENDPOINT: &str = "whatsapp";

/// Gateway acknowledgement
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub status: String,
}

pub struct WhatsAppClient {
    http: reqwest::Client,
    base_url: String,
    pacer: EndpointPacer,
}

impl WhatsAppClient {
    pub fn new(base_url: String, timeout: Duration, pacer: EndpointPacer) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            pacer,
        }
    }

    /// Relay a message through the gateway
    pub async fn send(&self, to: &str, message: &str) -> Result<SendReceipt> {
        self.pacer.acquire(ENDPOINT).await;
        let url = format!("{}/send", self.base_url);
        debug!(%url, to, "whatsapp send");
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "to": to, "message": message }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaseError::external_transient(ENDPOINT, "timeout")
                } else {
                    CaseError::external_transient(ENDPOINT, e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(CaseError::external_permanent(ENDPOINT, status.to_string()));
        }
        if !status.is_success() {
            return Err(CaseError::external_transient(ENDPOINT, status.to_string()));
        }
        response
            .json()
            .await
            .map_err(|e| CaseError::external_permanent(ENDPOINT, format!("bad payload: {e}")))
    }
}
