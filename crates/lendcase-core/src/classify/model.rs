//! Optional pre-built classifier model
//!
//! A term-weight model loaded from JSON at startup. Prediction is a
//! normalized weighted term-frequency score per document type; the model is
//! never trained in-process.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{CaseError, Result};
use crate::model::DocumentType;

/// Serialized model shape: type → { term → weight }
#[derive(Debug, Deserialize)]
struct ModelFile {
    classes: HashMap<String, HashMap<String, f64>>,
}

/// A loaded term-weight classifier model
#[derive(Debug, Clone)]
pub struct TermWeightModel {
    classes: Vec<(DocumentType, HashMap<String, f64>)>,
}

impl TermWeightModel {
    /// Load a model from its JSON serialization
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(json)
            .map_err(|e| CaseError::validation(format!("classifier model: {e}")))?;
        let mut classes = Vec::new();
        for (name, terms) in file.classes {
            let doc_type = DocumentType::parse(&name).ok_or_else(|| {
                CaseError::validation(format!("classifier model: unknown type '{name}'"))
            })?;
            let terms = terms
                .into_iter()
                .map(|(t, w)| (t.to_lowercase(), w))
                .collect();
            classes.push((doc_type, terms));
        }
        classes.sort_by_key(|(t, _)| *t);
        Ok(Self { classes })
    }

    /// Predict a type with confidence in [0, 1]; None when the text matches
    /// no class at all
    pub fn predict(&self, text: &str) -> Option<(DocumentType, f64)> {
        if self.classes.is_empty() {
            return None;
        }
        let mut counts: HashMap<String, f64> = HashMap::new();
        for token in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| t.len() >= 3)
        {
            let lower = token.to_lowercase();
            if self.classes.iter().any(|(_, terms)| terms.contains_key(&lower)) {
                *counts.entry(lower).or_insert(0.0) += 1.0;
            }
        }
        if counts.is_empty() {
            return None;
        }

        let mut scores: Vec<(DocumentType, f64)> = self
            .classes
            .iter()
            .map(|(ty, terms)| {
                let raw: f64 = counts
                    .iter()
                    .filter_map(|(tok, n)| terms.get(tok).map(|w| w * n))
                    .sum();
                (*ty, raw)
            })
            .collect();
        let total: f64 = scores.iter().map(|(_, s)| s.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let (ty, top) = scores[0];
        Some((ty, (top / total).clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> TermWeightModel {
        TermWeightModel::from_json(
            r#"{
                "classes": {
                    "BANK_STATEMENT": {"balance": 2.0, "neft": 1.5, "statement": 1.0},
                    "CIBIL_REPORT": {"cibil": 3.0, "score": 1.0, "enquiry": 1.5}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_predict_dominant_class() {
        let model = sample_model();
        let (ty, conf) = model
            .predict("CIBIL TransUnion score 745, enquiry summary, score history")
            .unwrap();
        assert_eq!(ty, DocumentType::CibilReport);
        assert!(conf > 0.75);
    }

    #[test]
    fn test_predict_none_without_known_terms() {
        let model = sample_model();
        assert!(model.predict("completely unrelated text").is_none());
    }

    #[test]
    fn test_rejects_unknown_class_name() {
        let err = TermWeightModel::from_json(r#"{"classes": {"NOPE": {}}}"#);
        assert!(err.is_err());
    }
}
