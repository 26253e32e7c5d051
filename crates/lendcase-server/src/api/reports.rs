//! Report endpoints

use axum::extract::{Extension, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use lendcase_core::error::CaseError;
use serde::Deserialize;

use crate::clients::SendReceipt;
use crate::db::{cases, reports};
use crate::error::ApiError;
use crate::jobs::handlers;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

fn map_precondition(err: CaseError) -> ApiError {
    match &err {
        CaseError::Precondition { missing } if missing == "feature vector" => {
            ApiError::precondition("FEATURES_NOT_BUILT", "run extraction before reporting")
        }
        CaseError::Precondition { missing } if missing == "eligibility run" => {
            ApiError::precondition("NO_ELIGIBILITY_RUN", "run eligibility before reporting")
        }
        _ => err.into(),
    }
}

/// Build and persist a fresh report
pub async fn generate(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;
    let report = handlers::generate_case_report(&state.pipeline, &case)
        .await
        .map_err(map_precondition)?;
    Ok(Json(serde_json::json!({
        "report_id": report.id,
        "pdf_key": report.pdf_key,
        "lenders_matched": report.payload.lenders_passed,
    })))
}

fn latest_report(
    state: &AppState,
    case_id: &str,
    operator_id: &str,
) -> ApiResult<lendcase_core::model::CaseReport> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, case_id, operator_id))?;
    state
        .db
        .with_conn(|c| reports::latest_for_case(c, case.uuid))?
        .ok_or_else(|| {
            ApiError::not_found("REPORT_NOT_FOUND", format!("no report for case '{case_id}'"))
        })
}

/// Stream the rendered PDF
pub async fn download_pdf(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = latest_report(&state, &case_id, &operator.id)?;
    let bytes = state.store.get(&report.pdf_key)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{case_id}.pdf\""),
            ),
        ],
        bytes,
    ))
}

/// Plain-text WhatsApp digest
pub async fn whatsapp_text(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = latest_report(&state, &case_id, &operator.id)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string())],
        report.whatsapp_summary,
    ))
}

/// Dispatch request
#[derive(Deserialize)]
pub struct SendRequest {
    pub to: String,
}

/// Relay the digest through the WhatsApp gateway
pub async fn whatsapp_send(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Json<SendReceipt>> {
    if request.to.trim().is_empty() {
        return Err(ApiError::validation("'to' must not be empty"));
    }
    let report = latest_report(&state, &case_id, &operator.id)?;
    let client = state.clients.whatsapp.as_ref().ok_or_else(|| {
        ApiError::precondition("PRECONDITION_FAILED", "WhatsApp gateway not configured")
    })?;
    let receipt = client.send(request.to.trim(), &report.whatsapp_summary).await?;
    Ok(Json(receipt))
}
