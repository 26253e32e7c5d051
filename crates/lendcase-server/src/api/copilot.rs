//! Copilot endpoints
//!
//! Classify the query, retrieve lender rows, inject conversation memory,
//! call the LLM, and fall back to deterministic templates when it is
//! unreachable. Every exchange is persisted.

use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use lendcase_core::copilot;
use lendcase_core::model::{CopilotQuery, QueryType};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::db::{cases, copilot as copilot_db, lenders};
use crate::error::ApiError;
use crate::metrics;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

/// Copilot request
#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub case_id: Option<String>,
}

/// Copilot response
#[derive(Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: serde_json::Value,
    pub query_type: String,
}

/// Answer a natural-language lender question
pub async fn query(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let text = request.query.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }
    let case_uuid: Option<Uuid> = match &request.case_id {
        Some(case_id) => Some(
            state
                .db
                .with_conn(|c| cases::require_for_operator(c, case_id, &operator.id))?
                .uuid,
        ),
        None => None,
    };

    let known_lenders = state.db.with_conn(lenders::lender_names)?;
    let (query_type, params) = copilot::classify_query(&text, &known_lenders);

    // KNOWLEDGE questions never touch the lender tables
    let sources = if query_type == QueryType::Knowledge {
        serde_json::Value::Array(vec![])
    } else {
        state
            .db
            .with_conn(|c| lenders::retrieve_for_query(c, query_type, &params))?
    };

    let (response_text, answered_by) =
        answer(&state, &operator.id, query_type, &sources, &text).await;

    let row = CopilotQuery {
        id: Uuid::new_v4(),
        operator_id: operator.id.clone(),
        case_id: case_uuid,
        query_text: text,
        detected_type: query_type,
        retrieved_sources: sources.clone(),
        response_text: response_text.clone(),
        created_at: Utc::now(),
    };
    state.db.with_conn(|c| copilot_db::insert(c, &row))?;

    metrics::record_copilot_query(query_type.as_str(), answered_by);
    state.audit.log(AuditEvent::CopilotQuery {
        operator_id: operator.id.clone(),
        query_type: query_type.as_str().to_string(),
        answered_by: answered_by.to_string(),
    });

    Ok(Json(QueryResponse {
        response: response_text,
        sources,
        query_type: query_type.as_str().to_string(),
    }))
}

/// Produce the answer text and the path that produced it
async fn answer(
    state: &AppState,
    operator_id: &str,
    query_type: QueryType,
    sources: &serde_json::Value,
    text: &str,
) -> (String, &'static str) {
    // Glossary definitions are deterministic; the LLM adds nothing
    if query_type == QueryType::Knowledge {
        if let Some(definition) = copilot::knowledge_answer(text) {
            return (definition, "glossary");
        }
    }

    if let Some(llm) = &state.clients.llm {
        let history: Vec<(String, String)> = state
            .db
            .with_conn(|c| copilot_db::history(c, operator_id, copilot::MEMORY_WINDOW))
            .unwrap_or_default()
            .into_iter()
            .rev() // oldest first for the prompt
            .map(|q| (q.query_text, q.response_text))
            .collect();
        let messages = copilot::compose_prompt(&history, sources, text);
        match llm.chat(&messages).await {
            Ok(completion) => return (completion, "llm"),
            Err(e) => warn!(error = %e, "llm call failed, falling back to template"),
        }
    }

    (copilot::template_fallback(query_type, sources), "template")
}

/// History entry view
#[derive(Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub response: String,
    pub query_type: String,
    pub created_at: String,
}

/// Recent exchanges for this operator, most recent first
pub async fn history(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let rows = state.db.with_conn(|c| copilot_db::history(c, &operator.id, 20))?;
    Ok(Json(
        rows.into_iter()
            .map(|q| HistoryEntry {
                query: q.query_text,
                response: q.response_text,
                query_type: q.detected_type.as_str().to_string(),
                created_at: q.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}
