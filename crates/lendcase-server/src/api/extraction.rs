//! Extraction and feature endpoints

use axum::extract::{Extension, Path, State};
use axum::Json;
use lendcase_core::model::{BorrowerFeatureVector, DocumentStatus};
use serde::Serialize;

use crate::db::{cases, documents, features};
use crate::error::ApiError;
use crate::jobs::handlers;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

/// Extraction run response
#[derive(Serialize)]
pub struct ExtractionResponse {
    pub status: &'static str,
    pub total_fields_extracted: usize,
    pub feature_completeness: f64,
    pub documents_processed: usize,
}

/// Run extraction over every classified document, then rebuild the feature
/// vector (including enrichers)
pub async fn run_extraction(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<ExtractionResponse>> {
    let (case, docs) = state.db.with_conn(|c| {
        let case = cases::require_for_operator(c, &case_id, &operator.id)?;
        let docs = documents::list_for_case(c, case.uuid)?;
        Ok((case, docs))
    })?;

    let mut total_fields = 0;
    let mut processed = 0;
    for doc in docs.iter().filter(|d| {
        d.doc_type.is_some()
            && matches!(d.status, DocumentStatus::Classified | DocumentStatus::Extracted)
    }) {
        total_fields += handlers::extract_document(&state.pipeline, doc)?;
        processed += 1;
    }
    if processed == 0 {
        return Err(ApiError::precondition(
            "PRECONDITION_FAILED",
            "no classified documents to extract from",
        ));
    }

    let vector = handlers::assemble_case_features(&state.pipeline, &case).await?;
    Ok(Json(ExtractionResponse {
        status: "ok",
        total_fields_extracted: total_fields,
        feature_completeness: vector.feature_completeness,
        documents_processed: processed,
    }))
}

/// Fetch the assembled feature vector
pub async fn get_features(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<BorrowerFeatureVector>> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;
    let vector = state
        .db
        .with_conn(|c| features::get(c, case.uuid))?
        .ok_or_else(|| {
            ApiError::precondition("FEATURES_NOT_BUILT", "feature vector not assembled yet")
        })?;
    Ok(Json(vector))
}
