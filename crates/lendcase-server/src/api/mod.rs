//! HTTP API
//!
//! Versioned under `/api/v1`, JSON bodies, error envelope
//! `{ "error": { code, message, details? } }`.

pub mod cases;
pub mod copilot;
pub mod eligibility;
pub mod extraction;
pub mod reports;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::operator::operator_middleware;
use crate::{metrics, AppState};

/// API Result type
pub type ApiResult<T> = std::result::Result<T, crate::error::ApiError>;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Cases
        .route("/cases", post(cases::create_case).get(cases::list_cases))
        .route("/cases/:case_id", get(cases::get_case).delete(cases::delete_case))
        .route("/cases/:case_id/status", get(cases::case_status))
        .route("/cases/:case_id/upload", post(uploads::upload))
        .route("/cases/:case_id/documents", get(cases::list_documents))
        .route("/cases/:case_id/checklist", get(cases::checklist))
        .route("/documents/:doc_id/content", get(cases::document_content))
        // Extraction
        .route("/extraction/case/:case_id/extract", post(extraction::run_extraction))
        .route("/extraction/case/:case_id/features", get(extraction::get_features))
        // Eligibility
        .route("/eligibility/case/:case_id/score", post(eligibility::score_case))
        .route("/eligibility/case/:case_id/results", get(eligibility::latest_results))
        // Reports
        .route("/reports/case/:case_id/generate", post(reports::generate))
        .route("/reports/case/:case_id/report/pdf", get(reports::download_pdf))
        .route("/reports/case/:case_id/report/whatsapp", get(reports::whatsapp_text))
        .route(
            "/reports/case/:case_id/report/whatsapp/send",
            post(reports::whatsapp_send),
        )
        // Copilot
        .route("/copilot/query", post(copilot::query))
        .route("/copilot/history", get(copilot::history));

    // Body limit leaves headroom over the per-case upload budget
    let body_limit = state.config.max_case_bytes as usize + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state.clone(), operator_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": lendcase_core::VERSION,
    }))
}

/// Prometheus text exposition
async fn metrics_endpoint() -> impl IntoResponse {
    metrics::render()
}
