//! LLM chat client
//!
//! OpenAI-style `POST {base}/chat/completions`; the completion string is the
//! first choice's message content. Errors fall back to template answers at
//! the copilot layer.

use std::time::Duration;

use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::ChatMessage;
use serde::Deserialize;
use tracing::debug;

use super::EndpointPacer;

const ENDPOINT: &str = "llm";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    pacer: EndpointPacer,
}

impl LlmClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
        pacer: EndpointPacer,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            pacer,
        }
    }

    /// Run one synchronous chat completion
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.pacer.acquire(ENDPOINT).await;
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, messages = messages.len(), "llm chat");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
            }))
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CaseError::external_permanent(ENDPOINT, format!("bad payload: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CaseError::external_permanent(ENDPOINT, "empty choices"))
    }
}
