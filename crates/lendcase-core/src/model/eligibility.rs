//! Eligibility run output rows

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard-filter verdict for one (case, product) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardFilterStatus {
    Pass,
    Fail,
}

impl HardFilterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Coarse approval likelihood band derived from the weighted score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalProbability {
    High,
    Medium,
    Low,
    None,
}

impl ApprovalProbability {
    /// Band for a weighted score
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }
}

/// One (case, lender product) row of an eligibility run.
///
/// Within a run, `rank` is a dense 1..k ordering over PASS rows by descending
/// score; FAIL rows carry no rank and no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub case_id: Uuid,
    pub lender_product_id: i64,
    pub run_id: Uuid,
    pub hard_filter_status: HardFilterStatus,
    /// filter name → pass/fail/skip reason
    pub hard_filter_details: BTreeMap<String, String>,
    pub eligibility_score: Option<f64>,
    pub approval_probability: ApprovalProbability,
    pub expected_ticket_min: Option<f64>,
    pub expected_ticket_max: Option<f64>,
    /// feature_completeness / 100
    pub confidence: f64,
    /// Weak components and absent documents, strongest lever first
    pub missing_for_improvement: Vec<String>,
    pub rank: Option<u32>,
    pub created_at: DateTime<Utc>,
}
