//! GSTIN lookup client
//!
//! `GET {base}/taxpayer/{gstin}` → trade name, constitution, principal place
//! and registration date. 4xx outcomes are permanent and persisted on the
//! case; 5xx and timeouts are transient.

use std::time::Duration;

use lendcase_core::error::{CaseError, Result};
use serde::Deserialize;
use tracing::debug;

use super::EndpointPacer;

const ENDPOINT: &str = "gstin";

/// Canonical taxpayer profile from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct GstinProfile {
    pub trade_name: Option<String>,
    pub constitution: Option<String>,
    #[serde(default)]
    pub principal_place: PrincipalPlace,
    /// dd/mm/yyyy or yyyy-mm-dd, provider-dependent
    pub registration_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrincipalPlace {
    pub pincode: Option<String>,
    pub state: Option<String>,
}

pub struct GstinClient {
    http: reqwest::Client,
    base_url: String,
    pacer: EndpointPacer,
}

impl GstinClient {
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

    /// Look up a GSTIN. Returns the parsed profile and the raw response body
    /// (cached on the case for audit).
    pub async fn lookup(&self, gstin: &str) -> Result<(GstinProfile, serde_json::Value)> {
        self.pacer.acquire(ENDPOINT).await;
        let url = format!("{}/taxpayer/{gstin}", self.base_url);
        debug!(%url, "gstin lookup");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(CaseError::external_permanent(
                ENDPOINT,
                format!("GSTIN {gstin}: {status}"),
            ));
        }
        if !status.is_success() {
            return Err(CaseError::external_transient(ENDPOINT, status.to_string()));
        }
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CaseError::external_permanent(ENDPOINT, format!("bad payload: {e}")))?;
        let profile: GstinProfile = serde_json::from_value(raw.clone())
            .map_err(|e| CaseError::external_permanent(ENDPOINT, format!("bad payload: {e}")))?;
        Ok((profile, raw))
    }
}

fn transport_error(e: reqwest::Error) -> CaseError {
    if e.is_timeout() {
        CaseError::external_transient(ENDPOINT, "timeout")
    } else {
        CaseError::external_transient(ENDPOINT, e.to_string())
    }
}
