//! Layer 2 — weighted component scores
//!
//! Six component scores in [0, 100]. A component whose inputs are missing is
//! excluded and the remaining weights renormalize.

use std::collections::BTreeSet;

use crate::model::{BorrowerFeatureVector, DocumentType, LenderProduct};

use super::EligibilityConfig;

/// One available component score
#[derive(Debug, Clone, Copy)]
pub struct ComponentScore {
    pub name: &'static str,
    pub score: f64,
    pub weight: f64,
}

/// Compute all available component scores for a PASS row
pub fn component_scores(
    feature: &BorrowerFeatureVector,
    product: &LenderProduct,
    present_documents: &BTreeSet<DocumentType>,
    config: &EligibilityConfig,
) -> Vec<ComponentScore> {
    let w = &config.weights;
    let mut out = Vec::with_capacity(6);

    if let Some(score) = feature.cibil_score {
        out.push(ComponentScore {
            name: "cibil",
            score: cibil_band(score),
            weight: w.cibil,
        });
    }
    if let (Some(turnover), Some(min)) = (feature.annual_turnover, product.min_turnover_annual) {
        if min > 0.0 {
            out.push(ComponentScore {
                name: "turnover",
                score: ratio_band(turnover / min),
                weight: w.turnover,
            });
        }
    }
    if let Some(vintage) = feature.business_vintage_years {
        out.push(ComponentScore {
            name: "vintage",
            score: vintage_band(vintage),
            weight: w.vintage,
        });
    }
    if let Some(score) = banking_strength(feature, product) {
        out.push(ComponentScore {
            name: "banking",
            score,
            weight: w.banking,
        });
    }
    if let Some(score) = foir_score(feature, config) {
        out.push(ComponentScore {
            name: "foir",
            score,
            weight: w.foir,
        });
    }
    if !product.required_documents.is_empty() {
        let present = product
            .required_documents
            .iter()
            .filter(|d| present_documents.contains(d))
            .count();
        out.push(ComponentScore {
            name: "documentation",
            score: 100.0 * present as f64 / product.required_documents.len() as f64,
            weight: w.documentation,
        });
    }

    out
}

/// Weighted average over the available components, renormalized
pub fn weighted_score(components: &[ComponentScore]) -> Option<f64> {
    let total_weight: f64 = components.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return None;
    }
    let sum: f64 = components.iter().map(|c| c.score * c.weight).sum();
    Some(sum / total_weight)
}

/// CIBIL band score
pub fn cibil_band(score: u16) -> f64 {
    match score {
        750.. => 100.0,
        725..=749 => 90.0,
        700..=724 => 75.0,
        675..=699 => 60.0,
        650..=674 => 40.0,
        _ => 20.0,
    }
}

/// Shared band for "actual / required" ratios (turnover, ABB)
pub fn ratio_band(ratio: f64) -> f64 {
    if ratio > 3.0 {
        100.0
    } else if ratio >= 2.0 {
        80.0
    } else if ratio >= 1.5 {
        60.0
    } else if ratio >= 1.0 {
        40.0
    } else {
        20.0
    }
}

/// Business vintage band
pub fn vintage_band(years: f64) -> f64 {
    if years >= 5.0 {
        100.0
    } else if years >= 3.0 {
        80.0
    } else if years >= 2.0 {
        60.0
    } else if years >= 1.0 {
        40.0
    } else {
        20.0
    }
}

/// Mean of the available banking sub-scores (ABB ratio, bounces, cash ratio)
fn banking_strength(feature: &BorrowerFeatureVector, product: &LenderProduct) -> Option<f64> {
    let mut subs: Vec<f64> = Vec::with_capacity(3);
    if let (Some(abb), Some(min)) = (feature.avg_monthly_balance, product.min_abb) {
        if min > 0.0 {
            subs.push(ratio_band(abb / min));
        }
    }
    if let Some(bounces) = feature.bounces_12m {
        subs.push(match bounces {
            0 => 100.0,
            1 | 2 => 70.0,
            _ => 30.0,
        });
    }
    if let Some(ratio) = feature.cash_deposit_ratio {
        subs.push(if ratio < 0.20 {
            100.0
        } else if ratio <= 0.40 {
            60.0
        } else {
            30.0
        });
    }
    if subs.is_empty() {
        return None;
    }
    Some(subs.iter().sum::<f64>() / subs.len() as f64)
}

/// FOIR score: existing EMIs over monthly income
fn foir_score(feature: &BorrowerFeatureVector, config: &EligibilityConfig) -> Option<f64> {
    let emis = feature.existing_emis?;
    let income = match config.foir_income_from_credits {
        true => feature.monthly_credit_avg.or(feature.monthly_turnover),
        false => feature.monthly_turnover.or(feature.monthly_credit_avg),
    }?;
    if income <= 0.0 {
        return None;
    }
    let foir = emis / income;
    Some(if foir < 0.30 {
        100.0
    } else if foir < 0.45 {
        75.0
    } else if foir < 0.55 {
        50.0
    } else if foir < 0.65 {
        30.0
    } else {
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cibil_bands() {
        assert_eq!(cibil_band(780), 100.0);
        assert_eq!(cibil_band(750), 100.0);
        assert_eq!(cibil_band(749), 90.0);
        assert_eq!(cibil_band(700), 75.0);
        assert_eq!(cibil_band(675), 60.0);
        assert_eq!(cibil_band(650), 40.0);
        assert_eq!(cibil_band(649), 20.0);
    }

    #[test]
    fn test_ratio_bands() {
        assert_eq!(ratio_band(3.5), 100.0);
        assert_eq!(ratio_band(2.5), 80.0);
        assert_eq!(ratio_band(1.7), 60.0);
        assert_eq!(ratio_band(1.0), 40.0);
        assert_eq!(ratio_band(0.9), 20.0);
    }

    #[test]
    fn test_weighted_score_renormalizes() {
        let components = [
            ComponentScore { name: "cibil", score: 100.0, weight: 0.25 },
            ComponentScore { name: "vintage", score: 50.0, weight: 0.15 },
        ];
        let score = weighted_score(&components).unwrap();
        let expected = (100.0 * 0.25 + 50.0 * 0.15) / 0.40;
        assert!((score - expected).abs() < 1e-9);
    }
}
