//! Upload handler
//!
//! Multipart batches of files and/or zip archives. Outcomes are reported per
//! file; a single-file duplicate is a 409.

use axum::extract::{Extension, Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::audit::AuditEvent;
use crate::db::cases;
use crate::error::ApiError;
use crate::ingest::{self, IngestLimits, IngestOutcome};
use crate::metrics;
use crate::middleware::operator::OperatorContext;
use crate::AppState;

use super::ApiResult;

/// Upload files into a case
pub async fn upload(
    State(state): State<AppState>,
    Extension(operator): Extension<OperatorContext>,
    Path(case_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<IngestOutcome>)> {
    let case = state
        .db
        .with_conn(|c| cases::require_for_operator(c, &case_id, &operator.id))?;

    let mut items: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("multipart: {e}")))?
    {
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("multipart '{filename}': {e}")))?;
        items.push((filename, bytes.to_vec()));
    }
    if items.is_empty() {
        return Err(ApiError::validation("no files in upload"));
    }
    let single_upload = items.len() == 1;

    let limits = IngestLimits {
        max_file_bytes: state.config.max_file_bytes,
        max_case_bytes: state.config.max_case_bytes,
    };
    let outcome = ingest::ingest(&state.db, &state.store, &case, items, limits, Utc::now())?;

    metrics::record_upload("created", outcome.created.len());
    metrics::record_upload("duplicate", outcome.duplicates.len());
    metrics::record_upload("rejected", outcome.rejected.len());
    state.audit.log(AuditEvent::DocumentsIngested {
        case_id: case.case_id.clone(),
        created: outcome.created.len(),
        duplicates: outcome.duplicates.len(),
        rejected: outcome.rejected.len(),
    });

    // A lone duplicate is a conflict, not a partial success
    if single_upload && outcome.created.is_empty() && outcome.duplicates.len() == 1 {
        return Err(ApiError::conflict(
            "DUPLICATE_DOCUMENT",
            "identical content already uploaded to this case",
        )
        .with_details(serde_json::json!({
            "doc_id": outcome.duplicates[0].doc_id,
            "filename": outcome.duplicates[0].filename,
        })));
    }

    if !outcome.created.is_empty() {
        super::cases::note_documents_uploaded(&state, &case)?;
    }

    Ok((StatusCode::OK, Json(outcome)))
}
