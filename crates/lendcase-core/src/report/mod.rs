//! Report assembly
//!
//! Builds the `CaseReportData` payload and the WhatsApp digest from the case,
//! its feature vector and the latest eligibility run. Deterministic: the same
//! inputs always produce the same payload.

use std::collections::BTreeSet;

use crate::model::{
    BorrowerFeatureVector, BorrowerSnapshot, Case, CaseReportData, Document, DocumentChecklist,
    DocumentStatus, DocumentType, EligibilityResult, HardFilterStatus, LenderMatchSummary,
    LenderProduct, ProgramType,
};

/// Lender rows shown in the report and the digest
const TOP_MATCH_LIMIT: usize = 5;

/// Documents expected for a program, used by the checklist
pub fn required_documents(program: ProgramType) -> &'static [DocumentType] {
    match program {
        ProgramType::Banking => &[
            DocumentType::Pan,
            DocumentType::Aadhaar,
            DocumentType::BankStatement,
            DocumentType::CibilReport,
        ],
        ProgramType::Gst => &[
            DocumentType::Pan,
            DocumentType::Aadhaar,
            DocumentType::GstCertificate,
            DocumentType::GstReturns,
            DocumentType::CibilReport,
        ],
        ProgramType::Hybrid => &[
            DocumentType::Pan,
            DocumentType::Aadhaar,
            DocumentType::BankStatement,
            DocumentType::GstCertificate,
            DocumentType::GstReturns,
            DocumentType::CibilReport,
            DocumentType::Itr,
        ],
    }
}

/// Build the document checklist for a case
pub fn build_checklist(program: ProgramType, documents: &[Document]) -> DocumentChecklist {
    let expected = required_documents(program);
    let present_types: BTreeSet<DocumentType> = documents
        .iter()
        .filter(|d| d.status != DocumentStatus::Failed)
        .filter_map(|d| d.doc_type)
        .filter(|t| *t != DocumentType::Unknown)
        .collect();

    let present: Vec<DocumentType> = expected
        .iter()
        .copied()
        .filter(|t| present_types.contains(t))
        .collect();
    let missing: Vec<DocumentType> = expected
        .iter()
        .copied()
        .filter(|t| !present_types.contains(t))
        .collect();
    let unreadable: Vec<String> = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Failed)
        .map(|d| d.original_filename.clone())
        .collect();

    let completeness_score = if expected.is_empty() {
        100.0
    } else {
        100.0 * present.len() as f64 / expected.len() as f64
    };
    DocumentChecklist {
        present,
        missing,
        unreadable,
        completeness_score,
    }
}

/// Assemble the full report payload
pub fn build_report(
    case: &Case,
    feature: &BorrowerFeatureVector,
    documents: &[Document],
    results: &[EligibilityResult],
    products: &[LenderProduct],
) -> CaseReportData {
    let checklist = build_checklist(case.program_type, documents);
    let passed: Vec<&EligibilityResult> = {
        let mut v: Vec<&EligibilityResult> = results
            .iter()
            .filter(|r| r.hard_filter_status == HardFilterStatus::Pass)
            .collect();
        v.sort_by_key(|r| r.rank.unwrap_or(u32::MAX));
        v
    };

    let top_matches: Vec<LenderMatchSummary> = passed
        .iter()
        .take(TOP_MATCH_LIMIT)
        .filter_map(|r| {
            let product = products.iter().find(|p| p.id == r.lender_product_id)?;
            Some(LenderMatchSummary {
                rank: r.rank.unwrap_or(0),
                lender_name: product.lender_name.clone(),
                product_name: product.product_name.clone(),
                eligibility_score: r.eligibility_score.unwrap_or(0.0),
                approval_probability: r.approval_probability,
                expected_ticket_min: r.expected_ticket_min,
                expected_ticket_max: r.expected_ticket_max,
                missing_for_improvement: r.missing_for_improvement.clone(),
            })
        })
        .collect();

    let expected_loan_min = top_matches.iter().filter_map(|m| m.expected_ticket_min).fold(
        None,
        |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))),
    );
    let expected_loan_max = top_matches.iter().filter_map(|m| m.expected_ticket_max).fold(
        None,
        |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))),
    );

    CaseReportData {
        case_id: case.case_id.clone(),
        borrower: BorrowerSnapshot {
            borrower_name: case.borrower_name.clone(),
            entity_type: feature.entity_type.map(|e| e.as_str().to_string()),
            gstin: feature.gstin.clone(),
            pincode: feature.pincode.clone(),
            business_vintage_years: feature.business_vintage_years,
            cibil_score: feature.cibil_score,
            annual_turnover: feature.annual_turnover,
            avg_monthly_balance: feature.avg_monthly_balance,
            feature_completeness: feature.feature_completeness,
        },
        strengths: strengths(feature, &checklist),
        risk_flags: risk_flags(feature),
        strategy: strategy(&top_matches),
        advisory: advisory(feature, &checklist),
        expected_loan_min,
        expected_loan_max,
        lenders_evaluated: results.len(),
        lenders_passed: passed.len(),
        checklist,
        top_matches,
    }
}

/// Positive signals worth leading the pitch with
fn strengths(feature: &BorrowerFeatureVector, checklist: &DocumentChecklist) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(score) = feature.cibil_score {
        if score >= 750 {
            out.push(format!("Excellent CIBIL score of {score}"));
        } else if score >= 700 {
            out.push(format!("Healthy CIBIL score of {score}"));
        }
    }
    if let Some(v) = feature.business_vintage_years {
        if v >= 5.0 {
            out.push(format!("Established business, {v:.1} years of vintage"));
        } else if v >= 3.0 {
            out.push(format!("{v:.1} years of business vintage"));
        }
    }
    if let Some(t) = feature.annual_turnover {
        if t >= 10_000_000.0 {
            out.push(format!("Annual turnover of ₹{:.1} Cr", t / 10_000_000.0));
        }
    }
    if feature.bounces_12m == Some(0) {
        out.push("Clean banking, no bounces in 12 months".to_string());
    }
    if let Some(r) = feature.cash_deposit_ratio {
        if r < 0.20 {
            out.push("Predominantly digital receipts".to_string());
        }
    }
    if checklist.missing.is_empty() && !checklist.present.is_empty() {
        out.push("Complete document set on file".to_string());
    }
    out
}

/// Negative signals a credit manager will probe
fn risk_flags(feature: &BorrowerFeatureVector) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(b) = feature.bounces_12m {
        if b >= 3 {
            out.push(format!("{b} cheque/ECS bounces in 12 months"));
        }
    }
    if let Some(r) = feature.cash_deposit_ratio {
        if r > 0.40 {
            out.push(format!("Cash deposits at {:.0}% of receipts", r * 100.0));
        }
    }
    if let Some(o) = feature.overdues {
        if o > 0 {
            out.push(format!("{o} overdue account(s) on bureau"));
        }
    }
    if let Some(score) = feature.cibil_score {
        if score < 650 {
            out.push(format!("CIBIL score {score} below lender comfort"));
        }
    }
    if let Some(e) = feature.enquiries_12m {
        if e >= 6 {
            out.push(format!("{e} bureau enquiries in 12 months"));
        }
    }
    out
}

/// Ordered submission recommendations over the ranked matches
fn strategy(top_matches: &[LenderMatchSummary]) -> Vec<String> {
    let mut out = Vec::new();
    for m in top_matches.iter().take(3) {
        let mut line = format!(
            "File with {} ({}) — score {:.0}",
            m.lender_name, m.product_name, m.eligibility_score
        );
        if let (Some(lo), Some(hi)) = (m.expected_ticket_min, m.expected_ticket_max) {
            line.push_str(&format!(
                ", expected ticket ₹{:.1}L–₹{:.1}L",
                lo / 100_000.0,
                hi / 100_000.0
            ));
        }
        out.push(line);
    }
    if top_matches.len() > 1 {
        out.push("Submit to the top two lenders in parallel to hedge approval risk".to_string());
    }
    out
}

/// Missing-data advisory
fn advisory(feature: &BorrowerFeatureVector, checklist: &DocumentChecklist) -> Vec<String> {
    let mut out = Vec::new();
    for doc in &checklist.missing {
        out.push(format!("Collect {}", doc.display_name()));
    }
    if feature.cibil_score.is_none() {
        out.push("CIBIL score unavailable; pull a fresh bureau report".to_string());
    }
    if feature.avg_monthly_balance.is_none() {
        out.push("Bank statement analysis pending; banking strength unscored".to_string());
    }
    if feature.gstin.is_none() {
        out.push("No GSTIN on file; GST-program lenders unreachable".to_string());
    }
    out
}

/// Short plain-text digest for WhatsApp delivery
pub fn whatsapp_summary(data: &CaseReportData) -> String {
    let b = &data.borrower;
    let mut lines = vec![format!("*{}* — {}", data.case_id, b.borrower_name)];
    if let Some(e) = &b.entity_type {
        lines.push(format!("Entity: {e}"));
    }
    if let Some(v) = b.business_vintage_years {
        lines.push(format!("Vintage: {v:.1} yrs"));
    }
    if let Some(c) = b.cibil_score {
        lines.push(format!("CIBIL: {c}"));
    }
    if let Some(t) = b.annual_turnover {
        lines.push(format!("Turnover: ₹{:.1}L p.a.", t / 100_000.0));
    }
    if let Some(abb) = b.avg_monthly_balance {
        lines.push(format!("ABB: ₹{:.1}L", abb / 100_000.0));
    }
    match data.top_matches.first() {
        Some(top) => lines.push(format!(
            "Top match: {} ({}) — {:.0}/100",
            top.lender_name, top.product_name, top.eligibility_score
        )),
        None => lines.push("No lender cleared hard filters yet".to_string()),
    }
    lines.push(format!(
        "{} of {} lenders matched",
        data.lenders_passed, data.lenders_evaluated
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn doc(case_id: Uuid, ty: DocumentType, status: DocumentStatus) -> Document {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Document {
            id: Uuid::new_v4(),
            case_id,
            storage_key: format!("cases/{case_id}/docs/x.pdf"),
            original_filename: format!("{}.pdf", ty.as_str().to_lowercase()),
            content_hash: "00".repeat(32),
            size_bytes: 1024,
            extension: "pdf".to_string(),
            doc_type: Some(ty),
            classification_confidence: Some(0.9),
            classification_method: None,
            ocr_text: None,
            page_count: Some(1),
            status,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_checklist_present_missing() {
        let case_id = Uuid::new_v4();
        let docs = vec![
            doc(case_id, DocumentType::Pan, DocumentStatus::Classified),
            doc(case_id, DocumentType::BankStatement, DocumentStatus::Extracted),
        ];
        let checklist = build_checklist(ProgramType::Banking, &docs);
        assert_eq!(checklist.present, vec![DocumentType::Pan, DocumentType::BankStatement]);
        assert_eq!(
            checklist.missing,
            vec![DocumentType::Aadhaar, DocumentType::CibilReport]
        );
        assert!((checklist.completeness_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_document_is_unreadable() {
        let case_id = Uuid::new_v4();
        let mut failed = doc(case_id, DocumentType::CibilReport, DocumentStatus::Failed);
        failed.original_filename = "cibil.pdf".to_string();
        let checklist = build_checklist(ProgramType::Banking, &[failed]);
        assert_eq!(checklist.unreadable, vec!["cibil.pdf".to_string()]);
        assert!(checklist.present.is_empty());
    }

    #[test]
    fn test_digest_mentions_top_match() {
        let data = CaseReportData {
            case_id: "CASE-20260101-0001".to_string(),
            borrower: BorrowerSnapshot {
                borrower_name: "Ravi Kumar".to_string(),
                entity_type: Some("PROPRIETORSHIP".to_string()),
                gstin: None,
                pincode: None,
                business_vintage_years: Some(4.0),
                cibil_score: Some(741),
                annual_turnover: Some(8_000_000.0),
                avg_monthly_balance: Some(90_000.0),
                feature_completeness: 70.0,
            },
            checklist: DocumentChecklist {
                present: vec![],
                missing: vec![],
                unreadable: vec![],
                completeness_score: 100.0,
            },
            strengths: vec![],
            risk_flags: vec![],
            top_matches: vec![LenderMatchSummary {
                rank: 1,
                lender_name: "Axis".to_string(),
                product_name: "Business Loan".to_string(),
                eligibility_score: 82.0,
                approval_probability: crate::model::ApprovalProbability::High,
                expected_ticket_min: Some(800_000.0),
                expected_ticket_max: Some(2_000_000.0),
                missing_for_improvement: vec![],
            }],
            strategy: vec![],
            advisory: vec![],
            expected_loan_min: Some(800_000.0),
            expected_loan_max: Some(2_000_000.0),
            lenders_evaluated: 12,
            lenders_passed: 4,
        };
        let digest = whatsapp_summary(&data);
        assert!(digest.contains("CASE-20260101-0001"));
        assert!(digest.contains("CIBIL: 741"));
        assert!(digest.contains("Top match: Axis"));
        assert!(digest.contains("4 of 12 lenders matched"));
    }
}
