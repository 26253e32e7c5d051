//! Eligibility engine
//!
//! Three layers over the active lender products: hard filters, weighted
//! component scoring, then ranking. Pure and deterministic; persistence and
//! run serialization live with the caller.

pub mod filters;
pub mod score;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::model::{
    ApprovalProbability, BorrowerFeatureVector, DocumentType, EligibilityResult, HardFilterStatus,
    LenderProduct, ProgramType,
};
use score::{component_scores, weighted_score, ComponentScore};

/// Component weights for the layer-2 score
#[derive(Debug, Clone, Copy)]
pub struct ComponentWeights {
    pub cibil: f64,
    pub turnover: f64,
    pub vintage: f64,
    pub banking: f64,
    pub foir: f64,
    pub documentation: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            cibil: 0.25,
            turnover: 0.20,
            vintage: 0.15,
            banking: 0.20,
            foir: 0.10,
            documentation: 0.10,
        }
    }
}

/// Engine tunables, centralized so under-specified defaults live in one place
#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    /// Hard filters that may be skipped for missing data while still passing
    pub max_skipped_filters: usize,
    /// Minimum available components for a score to be meaningful
    pub min_components: usize,
    pub weights: ComponentWeights,
    /// FOIR income denominator: mean monthly credits first, else turnover
    pub foir_income_from_credits: bool,
    /// Expected-ticket band as fractions of annual turnover
    pub ticket_lower_frac: f64,
    pub ticket_upper_frac: f64,
    /// Upper fraction when the score clears the HIGH band
    pub ticket_upper_frac_high: f64,
    /// Components below this score are listed as improvement levers
    pub weak_component_threshold: f64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            max_skipped_filters: 2,
            min_components: 3,
            weights: ComponentWeights::default(),
            foir_income_from_credits: true,
            ticket_lower_frac: 0.10,
            ticket_upper_frac: 0.15,
            ticket_upper_frac_high: 0.25,
            weak_component_threshold: 50.0,
        }
    }
}

/// Per-case inputs beyond the feature vector
#[derive(Debug)]
pub struct CaseContext {
    pub case_id: Uuid,
    pub program_type: ProgramType,
    /// Document types classified present on the case
    pub present_documents: BTreeSet<DocumentType>,
    /// Evaluation day, for age and vintage filters
    pub today: NaiveDate,
}

/// Evaluate every evaluable product for one case under a fresh run id.
///
/// Products that are inactive, without policy, or of another program are not
/// evaluated at all — they produce no row.
pub fn evaluate(
    feature: &BorrowerFeatureVector,
    ctx: &CaseContext,
    products: &[LenderProduct],
    lender_pincodes: &HashMap<i64, HashSet<String>>,
    config: &EligibilityConfig,
    run_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<EligibilityResult> {
    let confidence = feature.feature_completeness / 100.0;
    let mut rows: Vec<EligibilityResult> = Vec::new();

    for product in products {
        if !product.is_evaluable() || !product.matches_program(ctx.program_type) {
            continue;
        }
        let outcome = filters::apply(
            feature,
            product,
            lender_pincodes.get(&product.id),
            ctx.today,
        );

        let passes = outcome.passes(config.max_skipped_filters);
        let failed = outcome.failed;
        let skipped = outcome.skipped;
        let mut details = outcome.details;
        if !passes {
            if failed == 0 {
                details.insert(
                    "insufficient_data".to_string(),
                    format!(
                        "{} filters skipped > allowed {}",
                        skipped, config.max_skipped_filters
                    ),
                );
            }
            rows.push(fail_row(product, ctx, run_id, details, confidence, now));
            continue;
        }

        let components = component_scores(feature, product, &ctx.present_documents, config);
        if components.len() < config.min_components {
            details.insert("insufficient_data".to_string(), "insufficient data".to_string());
            rows.push(fail_row(product, ctx, run_id, details, confidence, now));
            continue;
        }
        let Some(score) = weighted_score(&components) else {
            details.insert("insufficient_data".to_string(), "insufficient data".to_string());
            rows.push(fail_row(product, ctx, run_id, details, confidence, now));
            continue;
        };

        let (ticket_min, ticket_max) = expected_ticket(feature, product, score, config);
        rows.push(EligibilityResult {
            case_id: ctx.case_id,
            lender_product_id: product.id,
            run_id,
            hard_filter_status: HardFilterStatus::Pass,
            hard_filter_details: details,
            eligibility_score: Some(score),
            approval_probability: ApprovalProbability::from_score(score),
            expected_ticket_min: ticket_min,
            expected_ticket_max: ticket_max,
            confidence,
            missing_for_improvement: improvement_levers(&components, product, ctx, config),
            rank: None,
            created_at: now,
        });
    }

    rank_rows(&mut rows, products);
    tracing::debug!(
        evaluated = rows.len(),
        passed = rows.iter().filter(|r| r.rank.is_some()).count(),
        "eligibility evaluation finished"
    );
    rows
}

fn fail_row(
    product: &LenderProduct,
    ctx: &CaseContext,
    run_id: Uuid,
    details: std::collections::BTreeMap<String, String>,
    confidence: f64,
    now: DateTime<Utc>,
) -> EligibilityResult {
    EligibilityResult {
        case_id: ctx.case_id,
        lender_product_id: product.id,
        run_id,
        hard_filter_status: HardFilterStatus::Fail,
        hard_filter_details: details,
        eligibility_score: None,
        approval_probability: ApprovalProbability::None,
        expected_ticket_min: None,
        expected_ticket_max: None,
        confidence,
        missing_for_improvement: Vec::new(),
        rank: None,
        created_at: now,
    }
}

/// Expected ticket band: turnover-derived, clamped to the product cap
fn expected_ticket(
    feature: &BorrowerFeatureVector,
    product: &LenderProduct,
    score: f64,
    config: &EligibilityConfig,
) -> (Option<f64>, Option<f64>) {
    let Some(turnover) = feature.annual_turnover else {
        return (None, product.max_ticket_size);
    };
    let upper_frac = if score >= 75.0 {
        config.ticket_upper_frac_high
    } else {
        config.ticket_upper_frac
    };
    let mut lo = turnover * config.ticket_lower_frac;
    let mut hi = turnover * upper_frac;
    if let Some(cap) = product.max_ticket_size {
        lo = lo.min(cap);
        hi = hi.min(cap);
    }
    (Some(lo), Some(hi))
}

/// Weak components and absent required documents, strongest lever first
fn improvement_levers(
    components: &[ComponentScore],
    product: &LenderProduct,
    ctx: &CaseContext,
    config: &EligibilityConfig,
) -> Vec<String> {
    let mut weak: Vec<&ComponentScore> = components
        .iter()
        .filter(|c| c.score < config.weak_component_threshold)
        .collect();
    weak.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut out: Vec<String> = weak
        .iter()
        .map(|c| format!("{} score {:.0} below {:.0}", c.name, c.score, config.weak_component_threshold))
        .collect();
    for doc in &product.required_documents {
        if !ctx.present_documents.contains(doc) {
            out.push(format!("missing document: {}", doc.display_name()));
        }
    }
    out
}

/// Dense 1..k ranking over PASS rows by descending score, ties by lender name
fn rank_rows(rows: &mut [EligibilityResult], products: &[LenderProduct]) {
    let name_of: HashMap<i64, &str> = products
        .iter()
        .map(|p| (p.id, p.lender_name.as_str()))
        .collect();

    let mut order: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.hard_filter_status == HardFilterStatus::Pass)
        .map(|(i, _)| i)
        .collect();
    order.sort_by(|&a, &b| {
        let sa = rows[a].eligibility_score.unwrap_or(0.0);
        let sb = rows[b].eligibility_score.unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let na = name_of.get(&rows[a].lender_product_id).copied().unwrap_or("");
                let nb = name_of.get(&rows[b].lender_product_id).copied().unwrap_or("");
                na.cmp(nb)
            })
    });
    for (pos, idx) in order.into_iter().enumerate() {
        rows[idx].rank = Some(pos as u32 + 1);
    }
}
