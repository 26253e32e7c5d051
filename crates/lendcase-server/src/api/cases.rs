//! Case management handlers

use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use lendcase_core::model::{Case, CaseStatus, Document, ProgramType};
use lendcase_core::report as reporting;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::db::{cases, documents, jobs};
use crate::error::ApiError;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

/// Create case request
#[derive(Deserialize)]
pub struct CreateCaseRequest {
    pub borrower_name: String,
    pub program_type: String,
    /// Manual overrides keyed by canonical field name
    #[serde(default)]
    pub overrides: serde_json::Map<String, serde_json::Value>,
}

/// Create case response
#[derive(Serialize)]
pub struct CreateCaseResponse {
    pub case_id: String,
    pub uuid: Uuid,
    pub status: &'static str,
}

/// Case summary for listings and detail
#[derive(Serialize)]
pub struct CaseView {
    pub case_id: String,
    pub uuid: Uuid,
    pub borrower_name: String,
    pub program_type: String,
    pub status: String,
    pub gstin: Option<String>,
    pub entity_type: Option<String>,
    pub pincode: Option<String>,
    pub created_at: String,
}

impl From<&Case> for CaseView {
    fn from(c: &Case) -> Self {
        Self {
            case_id: c.case_id.clone(),
            uuid: c.uuid,
            borrower_name: c.borrower_name.clone(),
            program_type: c.program_type.as_str().to_string(),
            status: c.status.as_str().to_string(),
            gstin: c.gstin.clone(),
            entity_type: c.entity_type.map(|e| e.as_str().to_string()),
            pincode: c.pincode.clone(),
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// Create a new case
pub async fn create_case(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Json(request): Json<CreateCaseRequest>,
) -> ApiResult<(StatusCode, Json<CreateCaseResponse>)> {
    let borrower_name = request.borrower_name.trim().to_string();
    if borrower_name.is_empty() {
        return Err(ApiError::validation("borrower_name must not be empty"));
    }
    let program_type = ProgramType::parse(&request.program_type).ok_or_else(|| {
        ApiError::validation(format!("unknown program_type '{}'", request.program_type))
    })?;

    let now = Utc::now();
    let case = state.db.with_tx(|tx| {
        let case_id = cases::next_case_id(tx, now.date_naive())?;
        let mut case = Case::new(case_id, operator.id.clone(), borrower_name, program_type, now);
        case.overrides = request.overrides.clone();
        cases::insert(tx, &case)?;
        Ok(case)
    })?;

    state.audit.log(AuditEvent::CaseCreated {
        case_id: case.case_id.clone(),
        operator_id: operator.id.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateCaseResponse {
            case_id: case.case_id,
            uuid: case.uuid,
            status: "CREATED",
        }),
    ))
}

/// List the operator's live cases
pub async fn list_cases(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
) -> ApiResult<Json<Vec<CaseView>>> {
    let list = state.db.with_conn(|c| cases::list_for_operator(c, &operator.id))?;
    Ok(Json(list.iter().map(CaseView::from).collect()))
}

/// Case detail
pub async fn get_case(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<CaseView>> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;
    Ok(Json(CaseView::from(&case)))
}

/// Soft-delete a case and cancel its pipeline work
pub async fn delete_case(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<StatusCode> {
    let now = Utc::now();
    let (case, cancelled) = state.db.with_tx(|tx| {
        let case = cases::require_for_operator(tx, &case_id, &operator.id)?;
        cases::soft_delete(tx, case.uuid, now)?;
        let cancelled = jobs::cancel_for_case(tx, case.uuid, now)?;
        Ok((case, cancelled))
    })?;

    state.audit.log(AuditEvent::CaseDeleted {
        case_id: case.case_id,
        operator_id: operator.id.clone(),
        cancelled_jobs: cancelled,
    });
    Ok(StatusCode::NO_CONTENT)
}

/// Pipeline progress: per-stage job counts plus per-document statuses
pub async fn case_status(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let (case, counts, docs) = state.db.with_conn(|c| {
        let case = cases::require_for_operator(c, &case_id, &operator.id)?;
        let counts = jobs::counts_for_case(c, case.uuid)?;
        let docs = documents::list_for_case(c, case.uuid)?;
        Ok((case, counts, docs))
    })?;

    let jobs_by_kind: Vec<serde_json::Value> = counts
        .iter()
        .map(|(kind, job_state, count)| {
            serde_json::json!({ "kind": kind, "state": job_state, "count": count })
        })
        .collect();
    let documents: Vec<serde_json::Value> = docs
        .iter()
        .map(|d| {
            serde_json::json!({
                "doc_id": d.id,
                "filename": d.original_filename,
                "status": d.status.as_str(),
                "failure_reason": d.failure_reason,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "case_id": case.case_id,
        "status": case.status.as_str(),
        "jobs": jobs_by_kind,
        "documents": documents,
    })))
}

/// Document listing row
#[derive(Serialize)]
pub struct DocumentView {
    pub doc_id: Uuid,
    pub filename: String,
    pub doc_type: Option<String>,
    pub classification_confidence: Option<f64>,
    pub status: String,
    pub page_count: Option<u32>,
}

impl From<&Document> for DocumentView {
    fn from(d: &Document) -> Self {
        Self {
            doc_id: d.id,
            filename: d.original_filename.clone(),
            doc_type: d.doc_type.map(|t| t.as_str().to_string()),
            classification_confidence: d.classification_confidence,
            status: d.status.as_str().to_string(),
            page_count: d.page_count,
        }
    }
}

/// List a case's documents
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<Vec<DocumentView>>> {
    let docs = state.db.with_conn(|c| {
        let case = cases::require_for_operator(c, &case_id, &operator.id)?;
        documents::list_for_case(c, case.uuid)
    })?;
    Ok(Json(docs.iter().map(DocumentView::from).collect()))
}

/// Checklist response
#[derive(Serialize)]
pub struct ChecklistResponse {
    pub program_type: String,
    pub available: Vec<String>,
    pub missing: Vec<String>,
    pub completeness_score: f64,
}

/// Document checklist for the case's program
pub async fn checklist(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<ChecklistResponse>> {
    let (case, docs) = state.db.with_conn(|c| {
        let case = cases::require_for_operator(c, &case_id, &operator.id)?;
        let docs = documents::list_for_case(c, case.uuid)?;
        Ok((case, docs))
    })?;
    let checklist = reporting::build_checklist(case.program_type, &docs);
    Ok(Json(ChecklistResponse {
        program_type: case.program_type.as_str().to_string(),
        available: checklist.present.iter().map(|d| d.as_str().to_string()).collect(),
        missing: checklist.missing.iter().map(|d| d.as_str().to_string()).collect(),
        completeness_score: checklist.completeness_score,
    }))
}

/// Download the original blob of a document
pub async fn document_content(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(doc_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let doc = state
        .db
        .with_conn(|c| documents::get(c, doc_id))?
        .ok_or_else(|| ApiError::not_found("DOCUMENT_NOT_FOUND", format!("Document '{doc_id}' not found")))?;
    // Ownership check through the owning case
    let case = state
        .db
        .with_conn(|c| cases::get_by_uuid(c, doc.case_id))?
        .ok_or_else(|| ApiError::case_not_found(doc.case_id))?;
    if case.operator_id != operator.id || case.deleted {
        return Err(ApiError::not_found(
            "DOCUMENT_NOT_FOUND",
            format!("Document '{doc_id}' not found"),
        ));
    }

    let bytes = state.store.get(&doc.storage_key)?;
    let content_type = match doc.extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        _ => "image/jpeg",
    };
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", doc.original_filename),
            ),
        ],
        bytes,
    ))
}

/// Advance a case after a successful upload batch
pub(crate) fn note_documents_uploaded(state: &AppState, case: &Case) -> ApiResult<()> {
    state.db.with_conn(|c| {
        cases::advance_status(c, case.uuid, CaseStatus::DocumentsUploaded, Utc::now())
    })?;
    Ok(())
}
