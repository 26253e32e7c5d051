//! Field extractor
//!
//! Runs the per-type rule table against OCR text and yields typed-string
//! field candidates. First match in reading order carries full confidence;
//! later matches are recorded at a discount.

pub mod rules;
pub mod value;

use serde::{Deserialize, Serialize};

use crate::model::DocumentType;
use rules::{is_valid_pan_holder_class, ExtractionRule, PostCheck};

/// Confidence multiplier for matches after the first, per field
const REPEAT_DISCOUNT: f64 = 0.8;
/// GSTIN confidence when its embedded PAN does not corroborate
const GSTIN_UNCORROBORATED: f64 = 0.70;

/// One extracted field candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    pub field_name: String,
    pub value: String,
    pub confidence: f64,
}

/// Extract all field candidates from a document's OCR text.
///
/// Unknown or unsupported document types yield an empty set.
pub fn extract(doc_type: DocumentType, text: &str) -> Vec<FieldCandidate> {
    let rules = rules::rules_for(doc_type);
    if rules.is_empty() || text.is_empty() {
        return Vec::new();
    }

    // PANs seen in this document, for GSTIN corroboration
    let pans: Vec<String> = regex_all(text, rules::PAN_PATTERN);

    let mut out = Vec::new();
    for rule in rules {
        let mut seen = 0usize;
        for caps in rule.pattern.captures_iter(text) {
            let raw = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if raw.is_empty() {
                continue;
            }
            let Some((normalized, mut confidence)) = apply_check(rule, raw, &pans) else {
                continue;
            };
            if seen > 0 {
                confidence *= REPEAT_DISCOUNT.powi(seen as i32);
            }
            // The same literal value again adds nothing
            if out
                .iter()
                .any(|c: &FieldCandidate| c.field_name == rule.field_name && c.value == normalized)
            {
                continue;
            }
            out.push(FieldCandidate {
                field_name: rule.field_name.to_string(),
                value: normalized,
                confidence: confidence.clamp(0.0, 1.0),
            });
            seen += 1;
        }
    }
    out
}

/// Validate and normalize one raw match; None drops the match entirely
fn apply_check(rule: &ExtractionRule, raw: &str, pans: &[String]) -> Option<(String, f64)> {
    let base = rule.base_confidence;
    match rule.check {
        None => Some((raw.to_string(), base)),
        Some(PostCheck::PanHolderClass) => {
            let conf = if is_valid_pan_holder_class(raw) { base } else { base * 0.5 };
            Some((raw.to_string(), conf))
        }
        Some(PostCheck::AadhaarPrefix) => {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() != 12 || digits.starts_with('0') || digits.starts_with('1') {
                return None;
            }
            Some((digits, base))
        }
        Some(PostCheck::CibilRange) => {
            let n = value::parse_int(raw)?;
            let conf = if (300..=900).contains(&n) { base } else { base * 0.5 };
            Some((n.to_string(), conf))
        }
        Some(PostCheck::GstinEmbeddedPan) => {
            let embedded = raw.get(2..12)?;
            let conf = if pans.iter().any(|p| p == embedded) {
                base
            } else {
                GSTIN_UNCORROBORATED
            };
            Some((raw.to_string(), conf))
        }
        Some(PostCheck::Date) => {
            let d = value::parse_date(raw)?;
            Some((d.format("%Y-%m-%d").to_string(), base))
        }
        Some(PostCheck::Amount) => {
            let v = value::parse_amount(raw)?;
            Some((format_amount(v), base))
        }
        Some(PostCheck::Count) => {
            let n = value::parse_int(raw)?;
            Some((n.to_string(), base))
        }
    }
}

fn regex_all(text: &str, pattern: &str) -> Vec<String> {
    regex::Regex::new(pattern)
        .expect("static extraction pattern")
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn format_amount(v: f64) -> String {
    if (v - v.trunc()).abs() < f64::EPSILON {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(fields: &'a [FieldCandidate], name: &str) -> Option<&'a FieldCandidate> {
        fields.iter().find(|f| f.field_name == name)
    }

    #[test]
    fn test_pan_extraction() {
        let text = "INCOME TAX DEPARTMENT\nName: RAVI KUMAR\nPermanent Account Number\nABCPE1234F\nDate of Birth: 15/06/1990";
        let fields = extract(DocumentType::Pan, text);
        let pan = find(&fields, "pan").unwrap();
        assert_eq!(pan.value, "ABCPE1234F");
        assert!(pan.confidence >= 0.9);
        let dob = find(&fields, "dob").unwrap();
        assert_eq!(dob.value, "1990-06-15");
    }

    #[test]
    fn test_pan_holder_class_penalty() {
        // 4th char 'X' is not a holder-class letter
        let fields = extract(DocumentType::Pan, "PAN: ABCXE1234F");
        let pan = find(&fields, "pan").unwrap();
        assert!((pan.confidence - 0.475).abs() < 1e-9);
    }

    #[test]
    fn test_aadhaar_rejects_bad_prefix() {
        let fields = extract(DocumentType::Aadhaar, "Aadhaar: 0123 4567 8901");
        assert!(find(&fields, "aadhaar").is_none());
        let fields = extract(DocumentType::Aadhaar, "Aadhaar: 9123 4567 8901");
        assert_eq!(find(&fields, "aadhaar").unwrap().value, "912345678901");
    }

    #[test]
    fn test_gstin_corroborated_by_pan() {
        let text = "GSTIN: 27ABCPE1234F1Z5\nPAN ABCPE1234F on record";
        let fields = extract(DocumentType::GstCertificate, text);
        let gstin = find(&fields, "gstin").unwrap();
        assert!((gstin.confidence - 0.95).abs() < 1e-9);

        let lone = extract(DocumentType::GstCertificate, "GSTIN: 27ABCPE1234F1Z5");
        let gstin = find(&lone, "gstin").unwrap();
        assert!((gstin.confidence - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_cibil_score_range() {
        let fields = extract(DocumentType::CibilReport, "CIBIL Score: 745");
        let score = find(&fields, "cibil_score").unwrap();
        assert_eq!(score.value, "745");
        assert!(score.confidence >= 0.7);

        let fields = extract(DocumentType::CibilReport, "credit score 150");
        let score = find(&fields, "cibil_score").unwrap();
        assert!(score.confidence < 0.5);
    }

    #[test]
    fn test_amount_normalization() {
        let fields = extract(
            DocumentType::FinancialStatement,
            "Revenue from Operations ₹ 1,25,00,000",
        );
        let t = find(&fields, "annual_turnover").unwrap();
        assert_eq!(t.value, "12500000");
    }

    #[test]
    fn test_repeat_matches_discounted() {
        let text = "credit score 710 ... CIBIL score 698";
        let fields: Vec<_> = extract(DocumentType::CibilReport, text)
            .into_iter()
            .filter(|f| f.field_name == "cibil_score")
            .collect();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].confidence > fields[1].confidence);
    }

    #[test]
    fn test_unknown_type_extracts_nothing() {
        assert!(extract(DocumentType::Unknown, "any text at all").is_empty());
    }
}
