//! Copilot query records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Detected intent of a copilot query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Cibil,
    Pincode,
    LenderSpecific,
    Comparison,
    Vintage,
    Turnover,
    Entity,
    Ticket,
    Requirement,
    /// Domain definition; answered without touching the lender tables
    Knowledge,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cibil => "CIBIL",
            Self::Pincode => "PINCODE",
            Self::LenderSpecific => "LENDER_SPECIFIC",
            Self::Comparison => "COMPARISON",
            Self::Vintage => "VINTAGE",
            Self::Turnover => "TURNOVER",
            Self::Entity => "ENTITY",
            Self::Ticket => "TICKET",
            Self::Requirement => "REQUIREMENT",
            Self::Knowledge => "KNOWLEDGE",
            Self::General => "GENERAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CIBIL" => Some(Self::Cibil),
            "PINCODE" => Some(Self::Pincode),
            "LENDER_SPECIFIC" => Some(Self::LenderSpecific),
            "COMPARISON" => Some(Self::Comparison),
            "VINTAGE" => Some(Self::Vintage),
            "TURNOVER" => Some(Self::Turnover),
            "ENTITY" => Some(Self::Entity),
            "TICKET" => Some(Self::Ticket),
            "REQUIREMENT" => Some(Self::Requirement),
            "KNOWLEDGE" => Some(Self::Knowledge),
            "GENERAL" => Some(Self::General),
            _ => None,
        }
    }
}

/// One question-and-answer exchange, persisted for conversation memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotQuery {
    pub id: Uuid,
    pub operator_id: String,
    pub case_id: Option<Uuid>,
    pub query_text: String,
    pub detected_type: QueryType,
    /// Retrieved lender rows that grounded the answer
    pub retrieved_sources: serde_json::Value,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
}

/// A chat message in the LLM prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}
