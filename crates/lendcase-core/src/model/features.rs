//! Borrower feature vector

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::case::EntityType;

/// Number of attributes counted toward `feature_completeness`
pub const TRACKED_ATTRIBUTES: usize = 19;

/// The merged, typed view of everything known about a borrower.
///
/// One vector per case; rebuilt idempotently from extracted fields and case
/// overrides, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowerFeatureVector {
    pub case_id: Uuid,

    // Identity
    pub full_name: Option<String>,
    pub pan: Option<String>,
    pub aadhaar: Option<String>,
    pub dob: Option<NaiveDate>,

    // Business
    pub entity_type: Option<EntityType>,
    pub gstin: Option<String>,
    pub pincode: Option<String>,
    pub business_vintage_years: Option<f64>,

    // Financial
    pub annual_turnover: Option<f64>,
    pub monthly_turnover: Option<f64>,
    pub avg_monthly_balance: Option<f64>,
    pub monthly_credit_avg: Option<f64>,
    pub bounces_12m: Option<u32>,
    pub cash_deposit_ratio: Option<f64>,
    pub existing_emis: Option<f64>,

    // Credit bureau
    pub cibil_score: Option<u16>,
    pub active_loans: Option<u32>,
    pub overdues: Option<u32>,
    pub enquiries_12m: Option<u32>,

    /// 100 × filled / tracked, recomputed on every assembly
    pub feature_completeness: f64,
    pub updated_at: DateTime<Utc>,
}

impl BorrowerFeatureVector {
    /// Count of populated tracked attributes
    pub fn filled_count(&self) -> usize {
        [
            self.full_name.is_some(),
            self.pan.is_some(),
            self.aadhaar.is_some(),
            self.dob.is_some(),
            self.entity_type.is_some(),
            self.gstin.is_some(),
            self.pincode.is_some(),
            self.business_vintage_years.is_some(),
            self.annual_turnover.is_some(),
            self.monthly_turnover.is_some(),
            self.avg_monthly_balance.is_some(),
            self.monthly_credit_avg.is_some(),
            self.bounces_12m.is_some(),
            self.cash_deposit_ratio.is_some(),
            self.existing_emis.is_some(),
            self.cibil_score.is_some(),
            self.active_loans.is_some(),
            self.overdues.is_some(),
            self.enquiries_12m.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// Recompute `feature_completeness` from the populated attributes
    pub fn recompute_completeness(&mut self) {
        self.feature_completeness =
            100.0 * self.filled_count() as f64 / TRACKED_ATTRIBUTES as f64;
    }

    /// Borrower age in whole years at `today`, when a date of birth is known
    pub fn age_years(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.dob?;
        let mut age = today.years_since(dob)?;
        // years_since floors already; guard against a dob in the future
        if dob > today {
            age = 0;
        }
        Some(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness_counts_filled() {
        let mut v = BorrowerFeatureVector {
            case_id: Uuid::new_v4(),
            cibil_score: Some(720),
            annual_turnover: Some(6_000_000.0),
            ..Default::default()
        };
        v.recompute_completeness();
        assert_eq!(v.filled_count(), 2);
        let expected = 100.0 * 2.0 / TRACKED_ATTRIBUTES as f64;
        assert!((v.feature_completeness - expected).abs() < 1e-9);
    }

    #[test]
    fn test_age_from_dob() {
        let mut v = BorrowerFeatureVector::default();
        v.dob = NaiveDate::from_ymd_opt(1990, 6, 15);
        let today = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();
        assert_eq!(v.age_years(today), Some(35));
        let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(v.age_years(today), Some(36));
    }
}
