//! Document entity and classification targets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Borrower document categories the classifier can assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Pan,
    Aadhaar,
    GstCertificate,
    GstReturns,
    CibilReport,
    BankStatement,
    Itr,
    UdyamShopLicense,
    FinancialStatement,
    Unknown,
}

impl DocumentType {
    /// All concrete (non-UNKNOWN) types
    pub const ALL: [DocumentType; 9] = [
        Self::Pan,
        Self::Aadhaar,
        Self::GstCertificate,
        Self::GstReturns,
        Self::CibilReport,
        Self::BankStatement,
        Self::Itr,
        Self::UdyamShopLicense,
        Self::FinancialStatement,
    ];

    /// Database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pan => "PAN",
            Self::Aadhaar => "AADHAAR",
            Self::GstCertificate => "GST_CERTIFICATE",
            Self::GstReturns => "GST_RETURNS",
            Self::CibilReport => "CIBIL_REPORT",
            Self::BankStatement => "BANK_STATEMENT",
            Self::Itr => "ITR",
            Self::UdyamShopLicense => "UDYAM_SHOP_LICENSE",
            Self::FinancialStatement => "FINANCIAL_STATEMENT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse from the database form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAN" => Some(Self::Pan),
            "AADHAAR" => Some(Self::Aadhaar),
            "GST_CERTIFICATE" => Some(Self::GstCertificate),
            "GST_RETURNS" => Some(Self::GstReturns),
            "CIBIL_REPORT" => Some(Self::CibilReport),
            "BANK_STATEMENT" => Some(Self::BankStatement),
            "ITR" => Some(Self::Itr),
            "UDYAM_SHOP_LICENSE" => Some(Self::UdyamShopLicense),
            "FINANCIAL_STATEMENT" => Some(Self::FinancialStatement),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Short display name used in checklists and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pan => "PAN card",
            Self::Aadhaar => "Aadhaar card",
            Self::GstCertificate => "GST certificate",
            Self::GstReturns => "GST returns",
            Self::CibilReport => "CIBIL report",
            Self::BankStatement => "Bank statement",
            Self::Itr => "Income tax return",
            Self::UdyamShopLicense => "Udyam / shop licence",
            Self::FinancialStatement => "Financial statement",
            Self::Unknown => "Unclassified document",
        }
    }
}

/// Document pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Uploaded,
    OcrComplete,
    Classified,
    Extracted,
    Failed,
}

impl DocumentStatus {
    /// Whether the document has finished its per-document pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }

    /// Database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "UPLOADED",
            Self::OcrComplete => "OCR_COMPLETE",
            Self::Classified => "CLASSIFIED",
            Self::Extracted => "EXTRACTED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse from the database form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPLOADED" => Some(Self::Uploaded),
            "OCR_COMPLETE" => Some(Self::OcrComplete),
            "CLASSIFIED" => Some(Self::Classified),
            "EXTRACTED" => Some(Self::Extracted),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How the classifier arrived at a document type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyMethod {
    Filename,
    Keyword,
    Model,
    Hybrid,
}

/// An uploaded borrower document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    /// Blob store key, `cases/{case_uuid}/docs/{document_uuid}{ext}`
    pub storage_key: String,
    pub original_filename: String,
    /// SHA-256 of the content, hex encoded
    pub content_hash: String,
    pub size_bytes: u64,
    /// Lowercased extension without the dot
    pub extension: String,
    pub doc_type: Option<DocumentType>,
    pub classification_confidence: Option<f64>,
    pub classification_method: Option<ClassifyMethod>,
    pub ocr_text: Option<String>,
    pub page_count: Option<u32>,
    pub status: DocumentStatus,
    /// Failure reason code when status is FAILED
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_round_trip() {
        for ty in DocumentType::ALL {
            assert_eq!(DocumentType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DocumentStatus::Extracted.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(!DocumentStatus::Classified.is_terminal());
    }
}
