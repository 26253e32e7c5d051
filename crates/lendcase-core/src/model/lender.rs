//! Lender product reference data

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::case::{EntityType, ProgramType};
use super::document::DocumentType;

/// One lender offering with its published policy thresholds.
///
/// Hard filters consult only these thresholds; a `None` threshold means the
/// lender does not publish that criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderProduct {
    pub id: i64,
    pub lender_name: String,
    pub product_name: String,
    /// When set, the product only applies to cases of this program
    pub program_type: Option<ProgramType>,
    pub is_active: bool,
    pub policy_available: bool,

    // Thresholds
    pub min_cibil_score: Option<u16>,
    pub min_vintage_years: Option<f64>,
    pub min_turnover_annual: Option<f64>,
    pub min_abb: Option<f64>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub max_ticket_size: Option<f64>,
    pub max_dpd_30plus: Option<u32>,

    /// Empty set = no entity restriction
    pub eligible_entity_types: BTreeSet<EntityType>,
    /// Documents the lender expects in a submission file
    pub required_documents: BTreeSet<DocumentType>,
    /// Whether serviceability is restricted to the lender's pincode list
    pub enforces_pincode: bool,
}

impl LenderProduct {
    /// Whether this product participates in eligibility runs at all
    pub fn is_evaluable(&self) -> bool {
        self.is_active && self.policy_available
    }

    /// Whether this product applies to a case of the given program
    pub fn matches_program(&self, program: ProgramType) -> bool {
        match self.program_type {
            Some(p) => p == program,
            None => true,
        }
    }

    /// Display label, `Lender — Product`
    pub fn label(&self) -> String {
        format!("{} — {}", self.lender_name, self.product_name)
    }
}
