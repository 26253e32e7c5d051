//! Classification pattern tables
//!
//! Rules are data: a filename regex table and per-type keyword pattern sets
//! with match-fraction thresholds.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::DocumentType;

/// A filename → type rule
pub struct FilenameRule {
    pub pattern: Regex,
    pub doc_type: DocumentType,
}

/// Keyword scoring set for one document type
pub struct KeywordSet {
    pub doc_type: DocumentType,
    pub patterns: Vec<Regex>,
    /// Minimum fraction of patterns that must match
    pub threshold: f64,
}

fn re(p: &str) -> Regex {
    Regex::new(&format!("(?i){p}")).expect("static classification pattern")
}

/// Filename heuristics, checked in order; first hit wins at confidence 0.90
pub static FILENAME_RULES: Lazy<Vec<FilenameRule>> = Lazy::new(|| {
    let rule = |p: &str, doc_type| FilenameRule { pattern: re(p), doc_type };
    vec![
        rule(r"gstr[-_ ]?[139]b?", DocumentType::GstReturns),
        rule(r"gst[-_ ]?(cert|certificate|reg)", DocumentType::GstCertificate),
        rule(r"reg[-_ ]?cert", DocumentType::GstCertificate),
        rule(r"udyam|shop[-_ ]?(act|licen[cs]e)|gumasta", DocumentType::UdyamShopLicense),
        rule(r"\bpan\b|pan[-_ ]?card", DocumentType::Pan),
        rule(r"aadhaa?r|\buidai\b", DocumentType::Aadhaar),
        rule(r"cibil|bureau|credit[-_ ]?report", DocumentType::CibilReport),
        rule(r"bank|statement|stmt|passbook", DocumentType::BankStatement),
        rule(r"\bitr\b|income[-_ ]?tax|saral|computation", DocumentType::Itr),
        rule(r"balance[-_ ]?sheet|p&l|profit|audit(ed)?[-_ ]?fin", DocumentType::FinancialStatement),
        rule(r"financial", DocumentType::FinancialStatement),
    ]
});

/// Keyword scoring sets over OCR text
pub static KEYWORD_SETS: Lazy<Vec<KeywordSet>> = Lazy::new(|| {
    let set = |doc_type, threshold, pats: &[&str]| KeywordSet {
        doc_type,
        patterns: pats.iter().map(|p| re(p)).collect(),
        threshold,
    };
    vec![
        set(
            DocumentType::Pan,
            0.40,
            &[
                r"permanent account number",
                r"income tax department",
                r"govt\.? of india",
                r"\b[A-Z]{5}[0-9]{4}[A-Z]\b",
                r"father'?s name",
            ],
        ),
        set(
            DocumentType::Aadhaar,
            0.40,
            &[
                r"aadhaa?r",
                r"unique identification authority",
                r"\buidai\b",
                r"\b\d{4}\s\d{4}\s\d{4}\b",
                r"government of india",
            ],
        ),
        set(
            DocumentType::GstCertificate,
            0.40,
            &[
                r"registration certificate",
                r"goods and services tax",
                r"\bgstin\b",
                r"constitution of business",
                r"principal place of business",
                r"date of liability",
            ],
        ),
        set(
            DocumentType::GstReturns,
            0.35,
            &[
                r"gstr[- ]?3b",
                r"gstr[- ]?1",
                r"outward supplies",
                r"taxable value",
                r"return period",
                r"\bigst\b|\bcgst\b|\bsgst\b",
            ],
        ),
        set(
            DocumentType::CibilReport,
            0.35,
            &[
                r"\bcibil\b",
                r"transunion",
                r"credit score",
                r"account\(?s\)? summary",
                r"enquir(y|ies)",
                r"days past due|\bdpd\b",
            ],
        ),
        set(
            DocumentType::BankStatement,
            0.35,
            &[
                r"statement of account",
                r"account statement",
                r"opening balance",
                r"closing balance",
                r"\bifsc\b",
                r"withdrawal|deposit",
                r"\bneft\b|\bimps\b|\bupi\b|\brtgs\b",
            ],
        ),
        set(
            DocumentType::Itr,
            0.35,
            &[
                r"income tax return",
                r"\bitr[- ]?[1-7]\b",
                r"assessment year",
                r"gross total income",
                r"acknowledgement number",
                r"e-?filing",
            ],
        ),
        set(
            DocumentType::UdyamShopLicense,
            0.40,
            &[
                r"udyam registration",
                r"\budyam-[A-Z]{2}-\d{2}-\d{7}\b",
                r"ministry of micro",
                r"shops? and establishment",
                r"enterprise name",
            ],
        ),
        set(
            DocumentType::FinancialStatement,
            0.40,
            &[
                r"balance sheet",
                r"profit (and|&) loss",
                r"statement of profit",
                r"auditor'?s report",
                r"current liabilities",
                r"revenue from operations",
            ],
        ),
    ]
});

/// Apply the filename table; returns the first matching type
pub fn match_filename(filename: &str) -> Option<DocumentType> {
    FILENAME_RULES
        .iter()
        .find(|r| r.pattern.is_match(filename))
        .map(|r| r.doc_type)
}

/// Score all keyword sets against OCR text, returning the best type whose
/// match fraction clears its threshold
pub fn score_keywords(text: &str) -> Option<(DocumentType, f64)> {
    let mut best: Option<(DocumentType, f64)> = None;
    for set in KEYWORD_SETS.iter() {
        if set.patterns.is_empty() {
            continue;
        }
        let hits = set.patterns.iter().filter(|p| p.is_match(text)).count();
        let score = hits as f64 / set.patterns.len() as f64;
        if score >= set.threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((set.doc_type, score));
        }
    }
    best
}
