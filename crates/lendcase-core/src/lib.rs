//! Lendcase Core
//!
//! Domain logic for loan-application case processing: the data model, the
//! document classifier, the field extractor, the feature assembler, the
//! three-layer eligibility engine, report assembly and copilot query
//! understanding.
//!
//! Everything here is deterministic and free of I/O; persistence, the job
//! queue and the HTTP surface live in `lendcase-server`.
//!
//! # Example
//!
//! ```rust
//! use lendcase_core::prelude::*;
//!
//! let classifier = Classifier::new();
//! let out = classifier.classify("gstr-3b_march.pdf", "");
//! assert_eq!(out.doc_type, DocumentType::GstReturns);
//!
//! let fields = extract(
//!     DocumentType::CibilReport,
//!     "CIBIL Score: 745\nActive accounts: 2",
//! );
//! assert!(fields.iter().any(|f| f.field_name == "cibil_score"));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod copilot;
pub mod eligibility;
pub mod error;
pub mod extract;
pub mod features;
pub mod model;
pub mod report;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classify::{Classification, Classifier, TermWeightModel};
    pub use crate::copilot::{
        classify_query, compose_prompt, knowledge_answer, template_fallback, QueryParams,
    };
    pub use crate::eligibility::{evaluate, CaseContext, ComponentWeights, EligibilityConfig};
    pub use crate::error::{CaseError, Result};
    pub use crate::extract::{extract, FieldCandidate};
    pub use crate::features::assemble;
    pub use crate::model::{
        format_case_id, ApprovalProbability, BorrowerFeatureVector, Case, CaseReport,
        CaseReportData, CaseStatus, ChatMessage, ClassifyMethod, CopilotQuery, Document,
        DocumentStatus, DocumentType, EligibilityResult, EntityType, ExtractedField, FieldSource,
        HardFilterStatus, JobKind, JobState, LenderProduct, ProgramType, QueryType,
    };
    pub use crate::report::{build_checklist, build_report, required_documents, whatsapp_summary};
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const NAME: &str = "lendcase-core";
