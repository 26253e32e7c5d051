//! Pipeline job kinds and states

use serde::{Deserialize, Serialize};

/// Kind of work a queued job carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Text extraction for one document
    Ocr,
    /// Classification for one document
    Classify,
    /// Field extraction for one document
    Extract,
    /// Checks whether all document jobs for a case are terminal and fans out
    /// the next stage
    Cascade,
    /// Feature-vector assembly for a case (includes enrichers)
    AssembleFeatures,
    /// Eligibility run for a case
    Eligibility,
    /// Report generation for a case
    Report,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Classify => "classify",
            Self::Extract => "extract",
            Self::Cascade => "cascade",
            Self::AssembleFeatures => "assemble_features",
            Self::Eligibility => "eligibility",
            Self::Report => "report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ocr" => Some(Self::Ocr),
            "classify" => Some(Self::Classify),
            "extract" => Some(Self::Extract),
            "cascade" => Some(Self::Cascade),
            "assemble_features" => Some(Self::AssembleFeatures),
            "eligibility" => Some(Self::Eligibility),
            "report" => Some(Self::Report),
            _ => None,
        }
    }

    /// Wall-clock budget for one attempt, in seconds
    pub fn timeout_secs(&self) -> u64 {
        match self {
            Self::Ocr => 120,
            Self::AssembleFeatures => 60,
            Self::Eligibility => 60,
            Self::Report => 60,
            _ => 30,
        }
    }
}

/// Queue state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
