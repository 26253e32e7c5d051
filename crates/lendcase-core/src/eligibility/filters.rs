//! Layer 1 — hard filters
//!
//! Binary disqualification rules over published thresholds. A filter whose
//! input feature is missing is skipped and recorded; a filter whose threshold
//! the lender does not publish is not applicable and not recorded.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::features::age_on;
use crate::model::{BorrowerFeatureVector, LenderProduct};

/// Outcome of one filter
enum FilterResult {
    Pass,
    Fail(String),
    Skipped,
}

/// Aggregated hard-filter outcome for one product
#[derive(Debug)]
pub struct HardFilterOutcome {
    /// filter name → "pass" | "skipped: data missing" | failure reason
    pub details: BTreeMap<String, String>,
    pub failed: usize,
    pub skipped: usize,
}

impl HardFilterOutcome {
    /// PASS requires no failures and at most `max_skipped` skipped filters
    pub fn passes(&self, max_skipped: usize) -> bool {
        self.failed == 0 && self.skipped <= max_skipped
    }
}

/// Run all hard filters for one product
pub fn apply(
    feature: &BorrowerFeatureVector,
    product: &LenderProduct,
    serviceable_pincodes: Option<&HashSet<String>>,
    today: NaiveDate,
) -> HardFilterOutcome {
    let mut outcome = HardFilterOutcome {
        details: BTreeMap::new(),
        failed: 0,
        skipped: 0,
    };
    let mut record = |name: &str, result: Option<FilterResult>| match result {
        None => {}
        Some(FilterResult::Pass) => {
            outcome.details.insert(name.to_string(), "pass".to_string());
        }
        Some(FilterResult::Skipped) => {
            outcome
                .details
                .insert(name.to_string(), "skipped: data missing".to_string());
            outcome.skipped += 1;
        }
        Some(FilterResult::Fail(reason)) => {
            outcome.details.insert(name.to_string(), reason);
            outcome.failed += 1;
        }
    };

    record("pincode", pincode_filter(feature, product, serviceable_pincodes));
    record("cibil_score", cibil_filter(feature, product));
    record("entity_type", entity_filter(feature, product));
    record("vintage", vintage_filter(feature, product));
    record("turnover", turnover_filter(feature, product));
    record("age", age_filter(feature, product, today));
    record("abb", abb_filter(feature, product));

    outcome
}

fn pincode_filter(
    feature: &BorrowerFeatureVector,
    product: &LenderProduct,
    serviceable: Option<&HashSet<String>>,
) -> Option<FilterResult> {
    if !product.enforces_pincode {
        return None;
    }
    let Some(pincode) = &feature.pincode else {
        return Some(FilterResult::Skipped);
    };
    match serviceable {
        Some(set) if set.contains(pincode) => Some(FilterResult::Pass),
        _ => Some(FilterResult::Fail(format!("pincode {pincode} not serviceable"))),
    }
}

fn cibil_filter(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<FilterResult> {
    let min = product.min_cibil_score?;
    Some(match feature.cibil_score {
        None => FilterResult::Skipped,
        Some(score) if score >= min => FilterResult::Pass,
        Some(score) => FilterResult::Fail(format!("CIBIL {score} < required {min}")),
    })
}

fn entity_filter(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<FilterResult> {
    if product.eligible_entity_types.is_empty() {
        return None;
    }
    Some(match feature.entity_type {
        None => FilterResult::Skipped,
        Some(et) if product.eligible_entity_types.contains(&et) => FilterResult::Pass,
        Some(et) => FilterResult::Fail(format!("entity {} not eligible", et.as_str())),
    })
}

fn vintage_filter(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<FilterResult> {
    let min = product.min_vintage_years?;
    Some(match feature.business_vintage_years {
        None => FilterResult::Skipped,
        Some(v) if v >= min => FilterResult::Pass,
        Some(v) => FilterResult::Fail(format!("vintage {v:.1}y < required {min:.1}y")),
    })
}

fn turnover_filter(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<FilterResult> {
    let min = product.min_turnover_annual?;
    Some(match feature.annual_turnover {
        None => FilterResult::Skipped,
        Some(t) if t >= min => FilterResult::Pass,
        Some(t) => FilterResult::Fail(format!("turnover {t:.0} < required {min:.0}")),
    })
}

fn age_filter(
    feature: &BorrowerFeatureVector,
    product: &LenderProduct,
    today: NaiveDate,
) -> Option<FilterResult> {
    if product.age_min.is_none() && product.age_max.is_none() {
        return None;
    }
    let lo = product.age_min.unwrap_or(18);
    let hi = product.age_max.unwrap_or(100);
    Some(match feature.dob {
        None => FilterResult::Skipped,
        Some(dob) => {
            let age = age_on(dob, today);
            if age >= lo && age <= hi {
                FilterResult::Pass
            } else {
                FilterResult::Fail(format!("age {age} outside [{lo}, {hi}]"))
            }
        }
    })
}

fn abb_filter(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<FilterResult> {
    let min = product.min_abb?;
    Some(match feature.avg_monthly_balance {
        None => FilterResult::Skipped,
        Some(abb) if abb >= min => FilterResult::Pass,
        Some(abb) => FilterResult::Fail(format!("ABB {abb:.0} < required {min:.0}")),
    })
}
