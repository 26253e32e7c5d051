//! Eligibility endpoints

use std::collections::HashMap;

use axum::extract::{Extension, Path, State};
use axum::Json;
use lendcase_core::error::CaseError;
use lendcase_core::model::EligibilityResult;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{cases, eligibility, lenders};
use crate::error::ApiError;
use crate::jobs::handlers;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

/// One result row joined with its lender label
#[derive(Serialize)]
pub struct ResultView {
    pub lender_name: String,
    pub product_name: String,
    #[serde(flatten)]
    pub result: EligibilityResult,
}

/// Eligibility run response
#[derive(Serialize)]
pub struct EligibilityResponse {
    pub run_id: Uuid,
    pub total_lenders_evaluated: usize,
    pub lenders_passed: usize,
    pub results: Vec<ResultView>,
}

fn to_views(state: &AppState, rows: Vec<EligibilityResult>) -> ApiResult<Vec<ResultView>> {
    let labels: HashMap<i64, (String, String)> = state
        .db
        .with_conn(lenders::list_all)?
        .into_iter()
        .map(|p| (p.id, (p.lender_name, p.product_name)))
        .collect();
    Ok(rows
        .into_iter()
        .map(|r| {
            let (lender_name, product_name) = labels
                .get(&r.lender_product_id)
                .cloned()
                .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
            ResultView { lender_name, product_name, result: r }
        })
        .collect())
}

fn map_precondition(err: CaseError) -> ApiError {
    match &err {
        CaseError::Precondition { missing } if missing == "feature vector" => {
            ApiError::precondition("FEATURES_NOT_BUILT", "run extraction before eligibility")
        }
        _ => err.into(),
    }
}

/// Run the eligibility engine for a case
pub async fn score_case(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<EligibilityResponse>> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;
    let (run_id, rows) = handlers::run_case_eligibility(&state.pipeline, &case)
        .await
        .map_err(map_precondition)?;

    let total = rows.len();
    let passed = rows.iter().filter(|r| r.rank.is_some()).count();
    Ok(Json(EligibilityResponse {
        run_id,
        total_lenders_evaluated: total,
        lenders_passed: passed,
        results: to_views(&state, rows)?,
    }))
}

/// Fetch the latest run's results
pub async fn latest_results(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<EligibilityResponse>> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;
    let run_id = state
        .db
        .with_conn(|c| eligibility::latest_run_id(c, case.uuid))?
        .ok_or_else(|| {
            ApiError::precondition("NO_ELIGIBILITY_RUN", "no eligibility run for this case yet")
        })?;
    let rows = state.db.with_conn(|c| eligibility::list_run(c, case.uuid, run_id))?;

    let total = rows.len();
    let passed = rows.iter().filter(|r| r.rank.is_some()).count();
    Ok(Json(EligibilityResponse {
        run_id,
        total_lenders_evaluated: total,
        lenders_passed: passed,
        results: to_views(&state, rows)?,
    }))
}
