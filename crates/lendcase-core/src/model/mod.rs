//! Cross-cutting data model
//!
//! Entities own downward only: a Case owns its Documents, ExtractedFields,
//! feature vector, eligibility results and report; lookups go through
//! indexes, never back-pointers.

pub mod case;
pub mod copilot;
pub mod document;
pub mod eligibility;
pub mod field;
pub mod features;
pub mod job;
pub mod lender;
pub mod report;

pub use case::{format_case_id, Case, CaseStatus, EntityType, ProgramType};
pub use copilot::{ChatMessage, CopilotQuery, QueryType};
pub use document::{ClassifyMethod, Document, DocumentStatus, DocumentType};
pub use eligibility::{ApprovalProbability, EligibilityResult, HardFilterStatus};
pub use field::{ExtractedField, FieldSource};
pub use features::{BorrowerFeatureVector, TRACKED_ATTRIBUTES};
pub use job::{JobKind, JobState};
pub use lender::LenderProduct;
pub use report::{
    BorrowerSnapshot, CaseReport, CaseReportData, DocumentChecklist, LenderMatchSummary,
};
