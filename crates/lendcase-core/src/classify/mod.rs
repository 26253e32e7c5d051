//! Document classifier
//!
//! Assigns a `DocumentType` from filename heuristics, keyword scoring and an
//! optional pre-built model. First sufficient signal wins; agreement between
//! filename and keywords earns a hybrid boost.

pub mod model;
pub mod patterns;

use serde::{Deserialize, Serialize};

use crate::model::{ClassifyMethod, DocumentType};
pub use model::TermWeightModel;

/// OCR text shorter than this is treated as absent
pub const MIN_TEXT_CHARS: usize = 30;

/// Confidence assigned to a filename-table hit
const FILENAME_CONFIDENCE: f64 = 0.90;
/// Confidence when filename and keyword signals agree
const HYBRID_CONFIDENCE: f64 = 0.95;
/// Minimum model confidence to accept a model prediction
const MODEL_ACCEPT_THRESHOLD: f64 = 0.75;

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub doc_type: DocumentType,
    pub confidence: f64,
    pub method: ClassifyMethod,
}

/// Document classifier with an optional loaded model
#[derive(Debug, Default)]
pub struct Classifier {
    model: Option<TermWeightModel>,
}

impl Classifier {
    /// Classifier without a model: filename + keyword signals only
    pub fn new() -> Self {
        Self { model: None }
    }

    /// Classifier with a pre-built model
    pub fn with_model(model: TermWeightModel) -> Self {
        Self { model: Some(model) }
    }

    /// Classify a document from its original filename and OCR text
    pub fn classify(&self, filename: &str, ocr_text: &str) -> Classification {
        let filename_hit = patterns::match_filename(filename);

        // Without usable text, the filename is all we have
        if ocr_text.trim().len() < MIN_TEXT_CHARS {
            return match filename_hit {
                Some(doc_type) => Classification {
                    doc_type,
                    confidence: FILENAME_CONFIDENCE,
                    method: ClassifyMethod::Filename,
                },
                None => Classification {
                    doc_type: DocumentType::Unknown,
                    confidence: 0.0,
                    method: ClassifyMethod::Filename,
                },
            };
        }

        if let Some(model) = &self.model {
            if let Some((doc_type, confidence)) = model.predict(ocr_text) {
                if confidence >= MODEL_ACCEPT_THRESHOLD {
                    return Classification {
                        doc_type,
                        confidence,
                        method: ClassifyMethod::Model,
                    };
                }
            }
        }

        let keyword_hit = patterns::score_keywords(ocr_text);
        tracing::debug!(?filename_hit, ?keyword_hit, "classification signals");

        match (filename_hit, keyword_hit) {
            (Some(f), Some((k, _))) if f == k => Classification {
                doc_type: f,
                confidence: HYBRID_CONFIDENCE,
                method: ClassifyMethod::Hybrid,
            },
            (_, Some((doc_type, score))) => Classification {
                doc_type,
                confidence: score,
                method: ClassifyMethod::Keyword,
            },
            (Some(doc_type), None) => Classification {
                doc_type,
                confidence: FILENAME_CONFIDENCE,
                method: ClassifyMethod::Filename,
            },
            (None, None) => Classification {
                doc_type: DocumentType::Unknown,
                confidence: 0.0,
                method: ClassifyMethod::Keyword,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_only_when_text_short() {
        let c = Classifier::new();
        let out = c.classify("pan_card.jpg", "   ");
        assert_eq!(out.doc_type, DocumentType::Pan);
        assert_eq!(out.method, ClassifyMethod::Filename);
        assert!((out.confidence - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        let c = Classifier::new();
        let out = c.classify("scan0001.jpg", "short");
        assert_eq!(out.doc_type, DocumentType::Unknown);
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_hybrid_boost_on_agreement() {
        let c = Classifier::new();
        let text = "Statement of Account for 2025. Opening Balance 10,000. \
                    Closing Balance 12,000. IFSC HDFC0000123, NEFT and UPI entries.";
        let out = c.classify("hdfc_bank_statement.pdf", text);
        assert_eq!(out.doc_type, DocumentType::BankStatement);
        assert_eq!(out.method, ClassifyMethod::Hybrid);
        assert!((out.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_beats_disagreeing_filename() {
        let c = Classifier::new();
        // Filename says PAN, text is clearly a CIBIL report
        let text = "CIBIL TransUnion credit score 752. Accounts Summary. \
                    Enquiries in the last 24 months: 3. DPD history follows.";
        let out = c.classify("pan_misc.pdf", text);
        assert_eq!(out.doc_type, DocumentType::CibilReport);
        assert_eq!(out.method, ClassifyMethod::Keyword);
    }

    #[test]
    fn test_model_short_circuits_when_confident() {
        let model = TermWeightModel::from_json(
            r#"{"classes": {"ITR": {"acknowledgement": 2.0, "assessment": 1.0}}}"#,
        )
        .unwrap();
        let c = Classifier::with_model(model);
        let out = c.classify(
            "doc.pdf",
            "Acknowledgement Number 1234 for Assessment Year 2025-26, acknowledgement copy",
        );
        assert_eq!(out.doc_type, DocumentType::Itr);
        assert_eq!(out.method, ClassifyMethod::Model);
        assert!(out.confidence >= 0.75);
    }
}
