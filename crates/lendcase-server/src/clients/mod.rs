//! Outbound collaborator clients
//!
//! GSTIN lookup, bank-statement analyzer, LLM chat and the WhatsApp gateway.
//! Every call carries a deadline and takes a paced slot for its endpoint;
//! excess requests wait inside the worker, never in the job queue.

pub mod bank;
pub mod gstin;
pub mod llm;
pub mod whatsapp;

use std::time::Duration;

use crate::config::ServerConfig;
pub use crate::throttle::EndpointPacer;

pub use bank::{BankAnalysis, BankAnalyzerClient};
pub use gstin::{GstinClient, GstinProfile};
pub use llm::LlmClient;
pub use whatsapp::{SendReceipt, WhatsAppClient};

/// Calls per second allowed against each remote endpoint
const ENDPOINT_CALLS_PER_SEC: u32 = 5;

/// All configured outbound clients; absent collaborators stay None
pub struct Clients {
    pub gstin: Option<GstinClient>,
    pub bank: Option<BankAnalyzerClient>,
    pub llm: Option<LlmClient>,
    pub whatsapp: Option<WhatsAppClient>,
}

impl Clients {
    /// Build clients from server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        let pacer = EndpointPacer::with_rate(ENDPOINT_CALLS_PER_SEC);
        let enricher_timeout = Duration::from_secs(config.enricher_timeout_secs);
        let llm_timeout = Duration::from_secs(config.llm_timeout_secs);

        Self {
            gstin: config
                .gstin_base_url
                .as_ref()
                .map(|url| GstinClient::new(url.clone(), enricher_timeout, pacer.clone())),
            bank: config
                .bank_analyzer_url
                .as_ref()
                .map(|url| BankAnalyzerClient::new(url.clone(), enricher_timeout, pacer.clone())),
            llm: match (&config.llm_base_url, &config.llm_api_key) {
                (Some(url), Some(key)) => Some(LlmClient::new(
                    url.clone(),
                    key.clone(),
                    config.llm_model.clone(),
                    llm_timeout,
                    pacer.clone(),
                )),
                _ => None,
            },
            whatsapp: config
                .whatsapp_gateway_url
                .as_ref()
                .map(|url| WhatsAppClient::new(url.clone(), enricher_timeout, pacer)),
        }
    }

    /// Client set with every collaborator absent (tests)
    pub fn disabled() -> Self {
        Self { gstin: None, bank: None, llm: None, whatsapp: None }
    }
}
