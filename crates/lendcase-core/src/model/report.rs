//! Case report payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::DocumentType;
use super::eligibility::ApprovalProbability;

/// Borrower snapshot section of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerSnapshot {
    pub borrower_name: String,
    pub entity_type: Option<String>,
    pub gstin: Option<String>,
    pub pincode: Option<String>,
    pub business_vintage_years: Option<f64>,
    pub cibil_score: Option<u16>,
    pub annual_turnover: Option<f64>,
    pub avg_monthly_balance: Option<f64>,
    pub feature_completeness: f64,
}

/// Document checklist section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChecklist {
    pub present: Vec<DocumentType>,
    pub missing: Vec<DocumentType>,
    /// Documents that failed OCR or classification
    pub unreadable: Vec<String>,
    /// 100 × present / expected for the case's program
    pub completeness_score: f64,
}

/// One ranked lender row in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderMatchSummary {
    pub rank: u32,
    pub lender_name: String,
    pub product_name: String,
    pub eligibility_score: f64,
    pub approval_probability: ApprovalProbability,
    pub expected_ticket_min: Option<f64>,
    pub expected_ticket_max: Option<f64>,
    pub missing_for_improvement: Vec<String>,
}

/// The assembled report payload, deterministic from its inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReportData {
    pub case_id: String,
    pub borrower: BorrowerSnapshot,
    pub checklist: DocumentChecklist,
    pub strengths: Vec<String>,
    pub risk_flags: Vec<String>,
    pub top_matches: Vec<LenderMatchSummary>,
    /// Ordered submission recommendations
    pub strategy: Vec<String>,
    /// Missing-data advisory lines
    pub advisory: Vec<String>,
    /// Expected loan range across the top matches
    pub expected_loan_min: Option<f64>,
    pub expected_loan_max: Option<f64>,
    pub lenders_evaluated: usize,
    pub lenders_passed: usize,
}

/// A stored, rendered report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub id: Uuid,
    pub case_id: Uuid,
    pub payload: CaseReportData,
    /// Blob key of the rendered PDF
    pub pdf_key: String,
    pub whatsapp_summary: String,
    pub generated_at: DateTime<Utc>,
}
