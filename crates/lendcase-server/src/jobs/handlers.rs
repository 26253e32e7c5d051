//! Pipeline stage handlers
//!
//! Each handler is resumable: it reads committed state, does its work, and
//! commits results plus the next stage's job in one transaction. The inner
//! functions are also called synchronously by the API endpoints that expose
//! stage runs directly.

use std::collections::BTreeSet;

use chrono::Utc;
use lendcase_core::error::{CaseError, Result};
use lendcase_core::extract as extraction;
use lendcase_core::features;
use lendcase_core::model::{
    BorrowerFeatureVector, Case, CaseReport, CaseStatus, Document, DocumentStatus, DocumentType,
    EligibilityResult, ExtractedField, JobKind,
};
use lendcase_core::{eligibility as engine, report as reporting};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::db::jobs::JobRecord;
use crate::db::{cases, documents, eligibility, fields, jobs, lenders, reports};
use crate::metrics;
use crate::ocr;
use crate::storage::BlobStore;

use super::Pipeline;

/// Dispatch one claimed job to its handler
pub async fn execute(p: &Pipeline, job: &JobRecord) -> Result<()> {
    match job.kind {
        JobKind::Ocr => run_ocr_job(p, job).await,
        JobKind::Classify => run_classify_job(p, job).await,
        JobKind::Extract => run_extract_job(p, job).await,
        JobKind::Cascade => run_cascade_job(p, job).await,
        JobKind::AssembleFeatures => run_assemble_job(p, job).await,
        JobKind::Eligibility => run_eligibility_job(p, job).await,
        JobKind::Report => run_report_job(p, job).await,
    }
}

fn document_id_of(job: &JobRecord) -> Result<Uuid> {
    job.payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CaseError::internal("job payload missing document_id"))
}

fn load_document(p: &Pipeline, id: Uuid) -> Result<Document> {
    p.db.with_conn(|c| documents::get(c, id))?
        .ok_or_else(|| CaseError::not_found("Document", id.to_string()))
}

fn load_case(p: &Pipeline, uuid: Uuid) -> Result<Case> {
    p.db.with_conn(|c| cases::get_by_uuid(c, uuid))?
        .ok_or_else(|| CaseError::not_found("Case", uuid.to_string()))
}

// ==================== OCR ====================

async fn run_ocr_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let doc_id = document_id_of(job)?;
    let doc = load_document(p, doc_id)?;
    let now = Utc::now();
    p.db.with_conn(|c| cases::advance_status(c, doc.case_id, CaseStatus::Processing, now))?;

    let bytes = p.store.get(&doc.storage_key)?;
    let extension = doc.extension.clone();
    let output = tokio::task::spawn_blocking(move || ocr::extract_text(&bytes, &extension))
        .await
        .map_err(|e| CaseError::internal(format!("ocr task: {e}")))?;

    match output {
        Ok(out) => {
            p.db.with_tx(|tx| {
                documents::set_ocr_result(tx, doc.id, &out.text, out.page_count, now)?;
                jobs::enqueue(
                    tx,
                    JobKind::Classify,
                    doc.case_id,
                    serde_json::json!({ "document_id": doc.id }),
                    now,
                )?;
                Ok(())
            })?;
            Ok(())
        }
        // Validation failures (corrupt, encrypted) are permanent: the
        // document fails, filename classification still runs, and the rest
        // of the case keeps moving
        Err(CaseError::Validation { message }) => {
            let reason = message
                .split(':')
                .next()
                .unwrap_or(ocr::REASON_CORRUPT_FILE)
                .to_string();
            let classification = p.classifier.classify(&doc.original_filename, "");
            p.db.with_tx(|tx| {
                documents::set_status(tx, doc.id, DocumentStatus::Failed, Some(&reason), now)?;
                if classification.doc_type != DocumentType::Unknown {
                    tx.prepare_cached(
                        "UPDATE documents SET doc_type = ?1, classification_confidence = ?2
                         WHERE id = ?3",
                    )
                    .map_err(crate::db::sqe)?
                    .execute(rusqlite::params![
                        classification.doc_type.as_str(),
                        classification.confidence,
                        doc.id.to_string(),
                    ])
                    .map_err(crate::db::sqe)?;
                }
                jobs::enqueue_coalesced(tx, JobKind::Cascade, doc.case_id, serde_json::json!({}), now)?;
                Ok(())
            })?;
            let case = load_case(p, doc.case_id)?;
            p.audit.log(AuditEvent::StageFailed {
                case_id: case.case_id,
                stage: "ocr".to_string(),
                reason: reason.clone(),
            });
            Err(CaseError::validation(reason))
        }
        Err(e) => Err(e),
    }
}

// ==================== Classification ====================

async fn run_classify_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let doc_id = document_id_of(job)?;
    let doc = load_document(p, doc_id)?;
    let text = doc.ocr_text.clone().unwrap_or_default();
    let classification = p.classifier.classify(&doc.original_filename, &text);
    info!(
        document = %doc.id,
        doc_type = classification.doc_type.as_str(),
        confidence = classification.confidence,
        method = ?classification.method,
        "document classified"
    );

    let now = Utc::now();
    p.db.with_tx(|tx| {
        documents::set_classification(
            tx,
            doc.id,
            classification.doc_type,
            classification.confidence,
            classification.method,
            now,
        )?;
        jobs::enqueue(
            tx,
            JobKind::Extract,
            doc.case_id,
            serde_json::json!({ "document_id": doc.id }),
            now,
        )?;
        Ok(())
    })
}

// ==================== Field extraction ====================

/// Extract fields for one classified document and mark it EXTRACTED.
/// Idempotent: prior extraction rows for the document are replaced.
pub fn extract_document(p: &Pipeline, doc: &Document) -> Result<usize> {
    let doc_type = doc
        .doc_type
        .ok_or_else(|| CaseError::precondition("document classification"))?;
    let text = doc.ocr_text.clone().unwrap_or_default();
    let now = Utc::now();
    let rows: Vec<ExtractedField> = extraction::extract(doc_type, &text)
        .into_iter()
        .map(|c| {
            ExtractedField::extracted(doc.case_id, doc.id, c.field_name, c.value, c.confidence, now)
        })
        .collect();
    let count = rows.len();

    p.db.with_tx(|tx| {
        fields::delete_for_document(tx, doc.id)?;
        fields::insert_all(tx, &rows)?;
        documents::set_status(tx, doc.id, DocumentStatus::Extracted, None, now)?;
        jobs::enqueue_coalesced(tx, JobKind::Cascade, doc.case_id, serde_json::json!({}), now)?;
        Ok(())
    })?;
    Ok(count)
}

async fn run_extract_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let doc_id = document_id_of(job)?;
    let doc = load_document(p, doc_id)?;
    extract_document(p, &doc)?;
    Ok(())
}

// ==================== Cascade ====================

/// Fan out feature assembly exactly once when every document job for the
/// case has reached a terminal state
async fn run_cascade_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let case_id = job.case_id;
    let ready = p.db.with_conn(|c| {
        Ok(documents::all_terminal(c, case_id)? && !jobs::document_jobs_pending(c, case_id)?)
    })?;
    if !ready {
        // The last document-level job to finish enqueues the next cascade
        return Ok(());
    }
    let now = Utc::now();
    p.db.with_conn(|c| {
        jobs::enqueue_coalesced(c, JobKind::AssembleFeatures, case_id, serde_json::json!({}), now)
    })?;
    Ok(())
}

// ==================== Feature assembly ====================

/// Run the enrichers and rebuild the feature vector. Enricher failures are
/// logged and never fail the stage.
pub async fn assemble_case_features(p: &Pipeline, case: &Case) -> Result<BorrowerFeatureVector> {
    let now = Utc::now();
    let mut case = case.clone();
    let docs = p.db.with_conn(|c| documents::list_for_case(c, case.uuid))?;
    let existing = p.db.with_conn(|c| fields::list_for_case(c, case.uuid))?;

    let mut external: Vec<ExtractedField> = Vec::new();

    // GSTIN enrichment; a cached response (success or permanent rejection)
    // is never re-fetched
    if let Some(client) = &p.clients.gstin {
        let gstin = case.gstin.clone().or_else(|| best_extracted(&existing, "gstin"));
        if let (Some(gstin), None) = (gstin, &case.gstin_response) {
            match client.lookup(&gstin).await {
                Ok((profile, raw)) => {
                    case.gstin = Some(gstin.clone());
                    case.gstin_response = Some(raw);
                    if let Some(constitution) = &profile.constitution {
                        external.push(ExtractedField::external(
                            case.uuid, "entity_type", constitution, now,
                        ));
                        // Parsed onto the case so later assemblies keep it
                        // even though the cached lookup is not re-fetched
                        case.entity_type =
                            lendcase_core::model::EntityType::parse(constitution)
                                .or(case.entity_type);
                    }
                    if let Some(pincode) = &profile.principal_place.pincode {
                        external.push(ExtractedField::external(case.uuid, "pincode", pincode, now));
                        case.pincode = Some(pincode.clone());
                    }
                    if let Some(reg) = profile
                        .registration_date
                        .as_deref()
                        .and_then(extraction::value::parse_date)
                    {
                        let vintage = features::vintage_years(reg, now.date_naive());
                        external.push(ExtractedField::external(
                            case.uuid,
                            "business_vintage_years",
                            vintage.to_string(),
                            now,
                        ));
                        case.business_vintage_years = Some(vintage);
                    }
                    if case.address.is_none() {
                        case.address = profile.principal_place.state.clone();
                    }
                    p.db.with_conn(|c| cases::update_derived(c, &case, now))?;
                }
                // Permanent rejections (e.g. GSTIN not found) are cached on
                // the case so the lookup is not repeated; transient failures
                // just skip enrichment for this assembly
                Err(e @ CaseError::ExternalPermanent { .. }) => {
                    warn!(case_id = %case.case_id, error = %e, "gstin rejected by provider");
                    case.gstin_response =
                        Some(serde_json::json!({ "error": e.to_string(), "gstin": gstin }));
                    p.db.with_conn(|c| cases::update_derived(c, &case, now))?;
                }
                Err(e) => warn!(case_id = %case.case_id, error = %e, "gstin enrichment failed"),
            }
        }
    }

    // Bank-statement analysis
    if let Some(client) = &p.clients.bank {
        let keys: Vec<String> = docs
            .iter()
            .filter(|d| d.doc_type == Some(DocumentType::BankStatement))
            .filter(|d| d.status != DocumentStatus::Failed)
            .map(|d| d.storage_key.clone())
            .collect();
        if !keys.is_empty() {
            match client.analyze(&keys).await {
                Ok(analysis) => {
                    if let Some(v) = analysis.monthly_credit_avg() {
                        external.push(ExtractedField::external(
                            case.uuid, "monthly_credit_avg", v.to_string(), now,
                        ));
                    }
                    if let Some(v) = analysis.avg_monthly_balance() {
                        external.push(ExtractedField::external(
                            case.uuid, "avg_monthly_balance", v.to_string(), now,
                        ));
                    }
                    if let Some(v) = analysis.bounces_12m {
                        external.push(ExtractedField::external(
                            case.uuid, "bounces_12m", v.to_string(), now,
                        ));
                    }
                    if let Some(v) = analysis.cash_deposit_ratio {
                        external.push(ExtractedField::external(
                            case.uuid, "cash_deposit_ratio", v.to_string(), now,
                        ));
                    }
                }
                Err(e) => warn!(case_id = %case.case_id, error = %e, "bank analysis failed"),
            }
        }
    }

    // Replace enricher rows, then assemble from the full current field set
    let mut all_fields: Vec<ExtractedField> = existing
        .into_iter()
        .filter(|f| f.source != lendcase_core::model::FieldSource::External)
        .collect();
    all_fields.extend(external.iter().cloned());
    let vector = features::assemble(&case, &all_fields, now);

    p.db.with_tx(|tx| {
        fields::delete_external_for_case(tx, case.uuid)?;
        fields::insert_all(tx, &external)?;
        crate::db::features::upsert(tx, &vector)?;
        cases::advance_status(tx, case.uuid, CaseStatus::FeaturesReady, now)?;
        Ok(())
    })?;
    Ok(vector)
}

async fn run_assemble_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let case = load_case(p, job.case_id)?;
    if case.deleted || p.db.with_conn(|c| jobs::is_cancelled(c, job.id))? {
        return Ok(());
    }
    let started = std::time::Instant::now();
    let vector = assemble_case_features(p, &case).await?;
    if p.db.with_conn(|c| jobs::is_cancelled(c, job.id))? {
        return Ok(());
    }
    let now = Utc::now();
    p.db.with_conn(|c| {
        jobs::enqueue_coalesced(c, JobKind::Eligibility, case.uuid, serde_json::json!({}), now)
    })?;
    p.audit.log(AuditEvent::StageCompleted {
        case_id: case.case_id,
        stage: "assemble_features".to_string(),
        duration_ms: started.elapsed().as_millis() as u64,
    });
    info!(
        case_id = %job.case_id,
        completeness = vector.feature_completeness,
        "feature vector assembled"
    );
    Ok(())
}

// ==================== Eligibility ====================

/// Evaluate all lender products for a case under a fresh run id.
/// Runs for the same case serialize on a per-case lock.
pub async fn run_case_eligibility(
    p: &Pipeline,
    case: &Case,
) -> Result<(Uuid, Vec<EligibilityResult>)> {
    let lock = p.eligibility_lock(case.uuid);
    let _guard = lock.lock().await;

    let feature = p
        .db
        .with_conn(|c| crate::db::features::get(c, case.uuid))?
        .ok_or_else(|| CaseError::precondition("feature vector"))?;
    let (products, pincodes, docs) = p.db.with_conn(|c| {
        Ok((
            lenders::list_evaluable(c)?,
            lenders::pincode_map(c)?,
            documents::list_for_case(c, case.uuid)?,
        ))
    })?;

    let present: BTreeSet<DocumentType> = docs
        .iter()
        .filter(|d| d.status != DocumentStatus::Failed)
        .filter_map(|d| d.doc_type)
        .filter(|t| *t != DocumentType::Unknown)
        .collect();
    let now = Utc::now();
    let ctx = engine::CaseContext {
        case_id: case.uuid,
        program_type: case.program_type,
        present_documents: present,
        today: now.date_naive(),
    };
    let run_id = Uuid::new_v4();
    let rows = engine::evaluate(
        &feature,
        &ctx,
        &products,
        &pincodes,
        &p.eligibility,
        run_id,
        now,
    );

    p.db.with_tx(|tx| {
        eligibility::insert_run(tx, &rows)?;
        cases::advance_status(tx, case.uuid, CaseStatus::EligibilityScored, now)?;
        Ok(())
    })?;

    let passed = rows.iter().filter(|r| r.rank.is_some()).count();
    metrics::record_eligibility_run(if passed > 0 { "matched" } else { "no_match" });
    p.audit.log(AuditEvent::EligibilityRun {
        case_id: case.case_id.clone(),
        run_id: run_id.to_string(),
        evaluated: rows.len(),
        passed,
    });
    Ok((run_id, rows))
}

async fn run_eligibility_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let case = load_case(p, job.case_id)?;
    if case.deleted || p.db.with_conn(|c| jobs::is_cancelled(c, job.id))? {
        return Ok(());
    }
    let (_, rows) = run_case_eligibility(p, &case).await?;
    info!(case_id = %case.case_id, evaluated = rows.len(), "eligibility run complete");

    // A case that already has a report gets it refreshed over the new run
    let has_report = p
        .db
        .with_conn(|c| reports::latest_for_case(c, case.uuid))?
        .is_some();
    if has_report {
        let now = Utc::now();
        p.db.with_conn(|c| {
            jobs::enqueue_coalesced(c, JobKind::Report, case.uuid, serde_json::json!({}), now)
        })?;
    }
    Ok(())
}

// ==================== Report ====================

/// Build, render and persist a report for a scored case
pub async fn generate_case_report(p: &Pipeline, case: &Case) -> Result<CaseReport> {
    let feature = p
        .db
        .with_conn(|c| crate::db::features::get(c, case.uuid))?
        .ok_or_else(|| CaseError::precondition("feature vector"))?;
    let run_id = p
        .db
        .with_conn(|c| eligibility::latest_run_id(c, case.uuid))?
        .ok_or_else(|| CaseError::precondition("eligibility run"))?;
    let (results, products, docs) = p.db.with_conn(|c| {
        Ok((
            eligibility::list_run(c, case.uuid, run_id)?,
            lenders::list_all(c)?,
            documents::list_for_case(c, case.uuid)?,
        ))
    })?;

    let data = reporting::build_report(case, &feature, &docs, &results, &products);
    let digest = reporting::whatsapp_summary(&data);
    let pdf_bytes = {
        let data = data.clone();
        tokio::task::spawn_blocking(move || crate::pdf::render(&data))
            .await
            .map_err(|e| CaseError::internal(format!("pdf task: {e}")))??
    };

    let now = Utc::now();
    let report_id = Uuid::new_v4();
    let pdf_key = BlobStore::report_key(case.uuid, report_id);
    p.store.put(&pdf_key, &pdf_bytes)?;

    let report = CaseReport {
        id: report_id,
        case_id: case.uuid,
        payload: data,
        pdf_key,
        whatsapp_summary: digest,
        generated_at: now,
    };
    p.db.with_tx(|tx| {
        reports::insert(tx, &report)?;
        cases::advance_status(tx, case.uuid, CaseStatus::ReportReady, now)?;
        Ok(())
    })?;
    p.audit.log(AuditEvent::ReportGenerated {
        case_id: case.case_id.clone(),
        report_id: report_id.to_string(),
    });
    Ok(report)
}

async fn run_report_job(p: &Pipeline, job: &JobRecord) -> Result<()> {
    let case = load_case(p, job.case_id)?;
    if case.deleted || p.db.with_conn(|c| jobs::is_cancelled(c, job.id))? {
        return Ok(());
    }
    generate_case_report(p, &case).await?;
    Ok(())
}

// ==================== Helpers ====================

fn best_extracted(fields: &[ExtractedField], name: &str) -> Option<String> {
    fields
        .iter()
        .filter(|f| f.field_name == name)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|f| f.field_value.clone())
}
