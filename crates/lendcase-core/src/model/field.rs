//! Extracted field rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a field value came from, in ascending precedence order for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Regex/anchor extraction from OCR text
    Extraction,
    /// Operator-entered override on the case
    Manual,
    /// Derived from other fields (e.g. annual from monthly turnover)
    Computed,
    /// External enricher (GSTIN lookup, bank-statement analyzer)
    External,
}

impl FieldSource {
    /// Database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Manual => "manual",
            Self::Computed => "computed",
            Self::External => "external",
        }
    }

    /// Parse from the database form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "extraction" => Some(Self::Extraction),
            "manual" => Some(Self::Manual),
            "computed" => Some(Self::Computed),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

/// One extracted (field, value) observation
///
/// Multiple rows per (case, field_name) are permitted; resolution happens in
/// the feature assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedField {
    pub id: Uuid,
    pub case_id: Uuid,
    /// Absent for enricher outputs not tied to one document
    pub document_id: Option<Uuid>,
    pub field_name: String,
    /// String form; typed conversion happens at assembly
    pub field_value: String,
    /// In [0, 1]
    pub confidence: f64,
    pub source: FieldSource,
    pub created_at: DateTime<Utc>,
}

impl ExtractedField {
    /// Build an extraction-sourced row
    pub fn extracted(
        case_id: Uuid,
        document_id: Uuid,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            document_id: Some(document_id),
            field_name: field_name.into(),
            field_value: field_value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: FieldSource::Extraction,
            created_at: now,
        }
    }

    /// Build an enricher-sourced row
    pub fn external(
        case_id: Uuid,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            document_id: None,
            field_name: field_name.into(),
            field_value: field_value.into(),
            confidence: 1.0,
            source: FieldSource::External,
            created_at: now,
        }
    }
}
