//! Bank-statement analyzer client
//!
//! `POST {base}/analyze` with the statement blob keys → per-month credit,
//! debit and closing balance, bounce count and cash-deposit fraction.

use std::time::Duration;

use lendcase_core::error::{CaseError, Result};
use serde::Deserialize;
use tracing::debug;

use super::EndpointPacer;

const ENDPOINT: &str = "bank_analyzer";

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyRow {
    pub month: String,
    pub credit: f64,
    pub debit: f64,
    pub closing_balance: f64,
}

/// Analyzer response
#[derive(Debug, Clone, Deserialize)]
pub struct BankAnalysis {
    #[serde(default)]
    pub monthly: Vec<MonthlyRow>,
    pub bounces_12m: Option<u32>,
    pub cash_deposit_ratio: Option<f64>,
}

impl BankAnalysis {
    /// Mean of monthly credits, when any months were analyzed
    pub fn monthly_credit_avg(&self) -> Option<f64> {
        if self.monthly.is_empty() {
            return None;
        }
        Some(self.monthly.iter().map(|m| m.credit).sum::<f64>() / self.monthly.len() as f64)
    }

    /// Mean of monthly closing balances
    pub fn avg_monthly_balance(&self) -> Option<f64> {
        if self.monthly.is_empty() {
            return None;
        }
        Some(
            self.monthly.iter().map(|m| m.closing_balance).sum::<f64>()
                / self.monthly.len() as f64,
        )
    }
}

pub struct BankAnalyzerClient {
    http: reqwest::Client,
    base_url: String,
    pacer: EndpointPacer,
}

impl BankAnalyzerClient {
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

    /// Analyze the classified bank-statement blobs of a case
    pub async fn analyze(&self, document_keys: &[String]) -> Result<BankAnalysis> {
        self.pacer.acquire(ENDPOINT).await;
        let url = format!("{}/analyze", self.base_url);
        debug!(%url, docs = document_keys.len(), "bank statement analysis");
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "document_keys": document_keys }))
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
