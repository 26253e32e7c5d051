//! Case entity and pipeline state machine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lending program a case is processed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramType {
    /// Banking-surrogate program (bank statements drive the decision)
    Banking,
    /// GST-surrogate program (returns drive the decision)
    Gst,
    /// Both banking and GST evidence
    Hybrid,
}

impl ProgramType {
    /// Parse a program type from its wire/database form
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BANKING" => Some(Self::Banking),
            "GST" => Some(Self::Gst),
            "HYBRID" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Wire/database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banking => "BANKING",
            Self::Gst => "GST",
            Self::Hybrid => "HYBRID",
        }
    }
}

/// Borrower entity constitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Individual,
    Proprietorship,
    Partnership,
    Llp,
    PrivateLimited,
    PublicLimited,
    Huf,
}

impl EntityType {
    /// Parse from free text (GSTIN constitution strings, CSV cells, overrides)
    pub fn parse(s: &str) -> Option<Self> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match norm.as_str() {
            "INDIVIDUAL" => Some(Self::Individual),
            "PROPRIETORSHIP" | "SOLEPROPRIETORSHIP" | "PROPRIETOR" => Some(Self::Proprietorship),
            "PARTNERSHIP" | "PARTNERSHIPFIRM" => Some(Self::Partnership),
            "LLP" | "LIMITEDLIABILITYPARTNERSHIP" => Some(Self::Llp),
            "PRIVATELIMITED" | "PRIVATELIMITEDCOMPANY" | "PVTLTD" => Some(Self::PrivateLimited),
            "PUBLICLIMITED" | "PUBLICLIMITEDCOMPANY" => Some(Self::PublicLimited),
            "HUF" | "HINDUUNDIVIDEDFAMILY" => Some(Self::Huf),
            _ => None,
        }
    }

    /// Wire/database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Proprietorship => "PROPRIETORSHIP",
            Self::Partnership => "PARTNERSHIP",
            Self::Llp => "LLP",
            Self::PrivateLimited => "PRIVATE_LIMITED",
            Self::PublicLimited => "PUBLIC_LIMITED",
            Self::Huf => "HUF",
        }
    }
}

/// Case pipeline status
///
/// Advances monotonically along the pipeline graph; a stage completion never
/// moves a case backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Created,
    DocumentsUploaded,
    Processing,
    FeaturesReady,
    EligibilityScored,
    ReportReady,
}

impl CaseStatus {
    /// Position in the pipeline graph, used for the monotonicity check
    pub fn stage_index(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::DocumentsUploaded => 1,
            Self::Processing => 2,
            Self::FeaturesReady => 3,
            Self::EligibilityScored => 4,
            Self::ReportReady => 5,
        }
    }

    /// The later of `self` and `next` — status never moves backwards
    pub fn advanced_to(self, next: CaseStatus) -> CaseStatus {
        if next.stage_index() > self.stage_index() {
            next
        } else {
            self
        }
    }

    /// Parse from the database form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "DOCUMENTS_UPLOADED" => Some(Self::DocumentsUploaded),
            "PROCESSING" => Some(Self::Processing),
            "FEATURES_READY" => Some(Self::FeaturesReady),
            "ELIGIBILITY_SCORED" => Some(Self::EligibilityScored),
            "REPORT_READY" => Some(Self::ReportReady),
            _ => None,
        }
    }

    /// Database form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::DocumentsUploaded => "DOCUMENTS_UPLOADED",
            Self::Processing => "PROCESSING",
            Self::FeaturesReady => "FEATURES_READY",
            Self::EligibilityScored => "ELIGIBILITY_SCORED",
            Self::ReportReady => "REPORT_READY",
        }
    }
}

/// A loan-application case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Human-facing identifier, `CASE-YYYYMMDD-NNNN`
    pub case_id: String,
    /// Internal identifier
    pub uuid: Uuid,
    /// Owning operator
    pub operator_id: String,
    /// Borrower display name
    pub borrower_name: String,
    pub program_type: ProgramType,
    pub status: CaseStatus,
    /// Manual overrides keyed by canonical field name
    #[serde(default)]
    pub overrides: serde_json::Map<String, serde_json::Value>,
    /// Derived fields filled by enrichers/extraction
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub entity_type: Option<EntityType>,
    pub pincode: Option<String>,
    pub business_vintage_years: Option<f64>,
    pub annual_turnover: Option<f64>,
    /// Raw GSTIN lookup response, cached for audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin_response: Option<serde_json::Value>,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Create a fresh case in CREATED state
    pub fn new(
        case_id: String,
        operator_id: impl Into<String>,
        borrower_name: impl Into<String>,
        program_type: ProgramType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            case_id,
            uuid: Uuid::new_v4(),
            operator_id: operator_id.into(),
            borrower_name: borrower_name.into(),
            program_type,
            status: CaseStatus::Created,
            overrides: serde_json::Map::new(),
            gstin: None,
            address: None,
            entity_type: None,
            pincode: None,
            business_vintage_years: None,
            annual_turnover: None,
            gstin_response: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Format a daily-sequence case identifier: `CASE-YYYYMMDD-NNNN`
pub fn format_case_id(day: NaiveDate, seq: u32) -> String {
    format!("CASE-{}-{:04}", day.format("%Y%m%d"), seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_id_format() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(format_case_id(day, 1), "CASE-20260101-0001");
        assert_eq!(format_case_id(day, 423), "CASE-20260101-0423");
    }

    #[test]
    fn test_status_monotonic() {
        let s = CaseStatus::FeaturesReady;
        assert_eq!(s.advanced_to(CaseStatus::Processing), CaseStatus::FeaturesReady);
        assert_eq!(
            s.advanced_to(CaseStatus::EligibilityScored),
            CaseStatus::EligibilityScored
        );
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(
            EntityType::parse("Private Limited Company"),
            Some(EntityType::PrivateLimited)
        );
        assert_eq!(EntityType::parse("sole proprietorship"), Some(EntityType::Proprietorship));
        assert_eq!(EntityType::parse("co-op society"), None);
    }
}
