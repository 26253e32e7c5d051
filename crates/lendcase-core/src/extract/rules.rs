//! Per-document-type extraction rules
//!
//! Extraction rules are data: each rule is an anchored regex whose first
//! capture group (or whole match) is the value, plus a base confidence and an
//! optional validity check applied by the engine.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::DocumentType;

/// Validity checks that adjust or veto a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCheck {
    /// 4th PAN character must be a holder-class letter; halves confidence
    /// when it is not
    PanHolderClass,
    /// Aadhaar numbers never start with 0 or 1; such matches are dropped
    AadhaarPrefix,
    /// CIBIL scores live in [300, 900]; halves confidence outside
    CibilRange,
    /// GSTIN positions 3–12 embed a PAN; confidence depends on whether it
    /// matches a PAN found in the same document
    GstinEmbeddedPan,
    /// Value must parse as a dd/mm/yyyy or dd-mm-yyyy date; normalized to ISO
    Date,
    /// Value must parse as an amount; normalized to a plain decimal
    Amount,
    /// Value must parse as a non-negative integer
    Count,
}

/// One extraction rule
pub struct ExtractionRule {
    pub field_name: &'static str,
    pub pattern: Regex,
    pub base_confidence: f64,
    pub check: Option<PostCheck>,
}

fn rule(
    field_name: &'static str,
    pattern: &str,
    base_confidence: f64,
    check: Option<PostCheck>,
) -> ExtractionRule {
    ExtractionRule {
        field_name,
        pattern: Regex::new(pattern).expect("static extraction pattern"),
        base_confidence,
        check,
    }
}

/// PAN format: five letters, four digits, one letter
pub const PAN_PATTERN: &str = r"\b([A-Z]{5}[0-9]{4}[A-Z])\b";
/// GSTIN format: state code + embedded PAN + entity digit + Z + checksum
pub const GSTIN_PATTERN: &str = r"\b([0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9][A-Z][0-9A-Z])\b";

static PAN_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule("pan", PAN_PATTERN, 0.95, Some(PostCheck::PanHolderClass)),
        rule(
            "full_name",
            r"(?im)^\s*(?:name|नाम)\s*[:\-]?\s*([A-Z][A-Za-z .]{2,60})$",
            0.70,
            None,
        ),
        rule(
            "dob",
            r"(?i)(?:date of birth|dob|जन्म तिथि)\s*[:\-]?\s*(\d{2}[/-]\d{2}[/-]\d{4})",
            0.85,
            Some(PostCheck::Date),
        ),
    ]
});

static AADHAAR_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule(
            "aadhaar",
            r"\b(\d{4}\s?\d{4}\s?\d{4})\b",
            0.90,
            Some(PostCheck::AadhaarPrefix),
        ),
        rule(
            "dob",
            r"(?i)(?:dob|date of birth|yob)\s*[:\-]?\s*(\d{2}[/-]\d{2}[/-]\d{4})",
            0.85,
            Some(PostCheck::Date),
        ),
        rule("pincode", r"\b([1-9][0-9]{5})\b", 0.55, None),
    ]
});

static GST_CERT_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule("gstin", GSTIN_PATTERN, 0.95, Some(PostCheck::GstinEmbeddedPan)),
        rule(
            "entity_type",
            r"(?i)constitution of business\s*[:\-]?\s*([A-Za-z ]{3,40})",
            0.80,
            None,
        ),
        rule(
            "gst_registration_date",
            r"(?i)(?:date of liability|date of registration)\s*[:\-]?\s*(\d{2}[/-]\d{2}[/-]\d{4})",
            0.85,
            Some(PostCheck::Date),
        ),
        rule("pincode", r"(?i)pin\s*(?:code)?\s*[:\-]?\s*([1-9][0-9]{5})", 0.80, None),
    ]
});

static GST_RETURNS_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule("gstin", GSTIN_PATTERN, 0.90, Some(PostCheck::GstinEmbeddedPan)),
        rule(
            "monthly_turnover",
            r"(?i)(?:total\s+)?(?:taxable\s+value|turnover|outward\s+supplies)[^0-9₹]{0,25}((?:₹|Rs\.?\s*)?[0-9][0-9,]*(?:\.\d+)?)",
            0.75,
            Some(PostCheck::Amount),
        ),
    ]
});

static CIBIL_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule(
            "cibil_score",
            r"(?i)(?:cibil|credit)\s*score[^0-9]{0,20}(\d{3})",
            0.90,
            Some(PostCheck::CibilRange),
        ),
        rule(
            "active_loans",
            r"(?i)active\s+(?:accounts|loans)[^0-9]{0,15}(\d{1,3})",
            0.75,
            Some(PostCheck::Count),
        ),
        rule(
            "overdues",
            r"(?i)overdue\s+(?:accounts|amount\s+accounts)?[^0-9]{0,15}(\d{1,3})",
            0.70,
            Some(PostCheck::Count),
        ),
        rule(
            "enquiries_12m",
            r"(?i)enquir(?:y|ies)[^0-9]{0,30}(\d{1,3})",
            0.70,
            Some(PostCheck::Count),
        ),
    ]
});

static BANK_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![rule(
        "avg_monthly_balance",
        r"(?i)(?:average|avg\.?)\s+(?:monthly\s+)?balance[^0-9₹]{0,20}((?:₹|Rs\.?\s*)?[0-9][0-9,]*(?:\.\d+)?)",
        0.75,
        Some(PostCheck::Amount),
    )]
});

static ITR_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule("pan", PAN_PATTERN, 0.90, Some(PostCheck::PanHolderClass)),
        rule(
            "annual_turnover",
            r"(?i)(?:gross\s+total\s+income|total\s+income|gross\s+receipts)[^0-9₹]{0,25}((?:₹|Rs\.?\s*)?[0-9][0-9,]*(?:\.\d+)?)",
            0.75,
            Some(PostCheck::Amount),
        ),
    ]
});

static UDYAM_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        rule(
            "incorporation_date",
            r"(?i)date of (?:incorporation|commencement)[^0-9]{0,20}(\d{2}[/-]\d{2}[/-]\d{4})",
            0.80,
            Some(PostCheck::Date),
        ),
        rule("pincode", r"(?i)pin\s*(?:code)?\s*[:\-]?\s*([1-9][0-9]{5})", 0.75, None),
    ]
});

static FINANCIAL_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![rule(
        "annual_turnover",
        r"(?i)(?:revenue\s+from\s+operations|total\s+revenue|turnover)[^0-9₹]{0,25}((?:₹|Rs\.?\s*)?[0-9][0-9,]*(?:\.\d+)?)",
        0.75,
        Some(PostCheck::Amount),
    )]
});

static NO_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(Vec::new);

/// Dispatch table: rules for a document type. Unsupported types extract
/// nothing, which is not an error.
pub fn rules_for(doc_type: DocumentType) -> &'static [ExtractionRule] {
    match doc_type {
        DocumentType::Pan => &PAN_RULES,
        DocumentType::Aadhaar => &AADHAAR_RULES,
        DocumentType::GstCertificate => &GST_CERT_RULES,
        DocumentType::GstReturns => &GST_RETURNS_RULES,
        DocumentType::CibilReport => &CIBIL_RULES,
        DocumentType::BankStatement => &BANK_RULES,
        DocumentType::Itr => &ITR_RULES,
        DocumentType::UdyamShopLicense => &UDYAM_RULES,
        DocumentType::FinancialStatement => &FINANCIAL_RULES,
        DocumentType::Unknown => &NO_RULES,
    }
}

/// PAN holder-class letters permitted in position 4
pub fn is_valid_pan_holder_class(pan: &str) -> bool {
    pan.as_bytes()
        .get(3)
        .map(|b| matches!(b, b'P' | b'C' | b'H' | b'F' | b'A' | b'T' | b'B' | b'L' | b'J' | b'G'))
        .unwrap_or(false)
}
