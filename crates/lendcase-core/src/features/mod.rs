//! Feature assembler
//!
//! Rebuilds the per-case `BorrowerFeatureVector` from the current extracted
//! fields and case overrides. Assembly is idempotent: the same inputs always
//! produce the same vector.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::extract::value;
use crate::model::{BorrowerFeatureVector, Case, EntityType, ExtractedField, FieldSource};

/// Extraction candidates below this confidence are used only as a last resort
pub const LOW_CONFIDENCE_FLOOR: f64 = 0.5;

/// Canonical attribute names, in vector order
pub const FIELD_NAMES: [&str; 19] = [
    "full_name",
    "pan",
    "aadhaar",
    "dob",
    "entity_type",
    "gstin",
    "pincode",
    "business_vintage_years",
    "annual_turnover",
    "monthly_turnover",
    "avg_monthly_balance",
    "monthly_credit_avg",
    "bounces_12m",
    "cash_deposit_ratio",
    "existing_emis",
    "cibil_score",
    "active_loans",
    "overdues",
    "enquiries_12m",
];

/// Resolve the winning string value for one attribute.
///
/// Precedence: manual override → external enricher → extraction with
/// confidence ≥ 0.5 (highest first) → any remaining extraction.
fn resolve<'a>(
    name: &str,
    overrides: &'a serde_json::Map<String, serde_json::Value>,
    fields: &'a [ExtractedField],
) -> Option<String> {
    if let Some(v) = overrides.get(name) {
        let s = json_to_string(v);
        if !s.is_empty() {
            return Some(s);
        }
    }

    let mut external: Vec<&ExtractedField> = Vec::new();
    let mut extracted: Vec<&ExtractedField> = Vec::new();
    for f in fields.iter().filter(|f| f.field_name == name) {
        match f.source {
            FieldSource::External => external.push(f),
            FieldSource::Extraction | FieldSource::Computed => extracted.push(f),
            FieldSource::Manual => return Some(f.field_value.clone()),
        }
    }
    if let Some(f) = external.first() {
        return Some(f.field_value.clone());
    }

    extracted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(f) = extracted.iter().find(|f| f.confidence >= LOW_CONFIDENCE_FLOOR) {
        return Some(f.field_value.clone());
    }
    extracted.first().map(|f| f.field_value.clone())
}

fn json_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Assemble the feature vector for a case.
///
/// `now` drives the vintage computation from registration dates and the
/// vector timestamp; pass a fixed instant for reproducible tests.
pub fn assemble(
    case: &Case,
    fields: &[ExtractedField],
    now: DateTime<Utc>,
) -> BorrowerFeatureVector {
    let get = |name: &str| resolve(name, &case.overrides, fields);
    let get_f64 = |name: &str| get(name).and_then(|s| value::parse_amount(&s));
    let get_u32 = |name: &str| get(name).and_then(|s| value::parse_int(&s)).map(|n| n as u32);

    let mut v = BorrowerFeatureVector {
        case_id: case.uuid,
        full_name: get("full_name"),
        pan: get("pan"),
        aadhaar: get("aadhaar"),
        dob: get("dob").and_then(|s| value::parse_date(&s)),
        entity_type: get("entity_type")
            .and_then(|s| EntityType::parse(&s))
            .or(case.entity_type),
        gstin: get("gstin").or_else(|| case.gstin.clone()),
        pincode: get("pincode").or_else(|| case.pincode.clone()),
        business_vintage_years: get_f64("business_vintage_years")
            .or(case.business_vintage_years),
        annual_turnover: get_f64("annual_turnover").or(case.annual_turnover),
        monthly_turnover: get_f64("monthly_turnover"),
        avg_monthly_balance: get_f64("avg_monthly_balance"),
        monthly_credit_avg: get_f64("monthly_credit_avg"),
        bounces_12m: get_u32("bounces_12m"),
        cash_deposit_ratio: get_f64("cash_deposit_ratio"),
        existing_emis: get_f64("existing_emis"),
        cibil_score: get("cibil_score")
            .and_then(|s| value::parse_int(&s))
            .filter(|n| (0..=2000).contains(n))
            .map(|n| n as u16),
        active_loans: get_u32("active_loans"),
        overdues: get_u32("overdues"),
        enquiries_12m: get_u32("enquiries_12m"),
        feature_completeness: 0.0,
        updated_at: now,
    };

    // Vintage falls back to a registration/incorporation date when no direct
    // candidate exists
    if v.business_vintage_years.is_none() {
        let reg = get("gst_registration_date")
            .or_else(|| get("incorporation_date"))
            .and_then(|s| value::parse_date(&s));
        if let Some(d) = reg {
            v.business_vintage_years = Some(vintage_years(d, now.date_naive()));
        }
    }

    // monthly_turnover defaults to the analyzer's mean monthly credits
    if v.monthly_turnover.is_none() {
        v.monthly_turnover = v.monthly_credit_avg;
    }
    // annual_turnover defaults to 12 × monthly when not independently known
    if v.annual_turnover.is_none() {
        v.annual_turnover = v.monthly_turnover.map(|m| m * 12.0);
    }

    v.recompute_completeness();
    v
}

/// Fractional years between a registration date and today (365.25-day year)
pub fn vintage_years(registered: NaiveDate, today: NaiveDate) -> f64 {
    let days = today.signed_duration_since(registered).num_days();
    (days.max(0) as f64 / 365.25 * 100.0).round() / 100.0
}

/// Compute borrower age on a given day, used by the eligibility age filter
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{format_case_id, ProgramType};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn test_case() -> Case {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Case::new(
            format_case_id(now.date_naive(), 1),
            "op-1",
            "Ravi Kumar",
            ProgramType::Banking,
            now,
        )
    }

    fn field(case_id: Uuid, name: &str, val: &str, conf: f64, source: FieldSource) -> ExtractedField {
        ExtractedField {
            id: Uuid::new_v4(),
            case_id,
            document_id: None,
            field_name: name.into(),
            field_value: val.into(),
            confidence: conf,
            source,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_manual_override_wins() {
        let mut case = test_case();
        case.overrides
            .insert("cibil_score".into(), serde_json::json!(760));
        let fields = vec![field(case.uuid, "cibil_score", "640", 0.9, FieldSource::Extraction)];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.cibil_score, Some(760));
    }

    #[test]
    fn test_external_beats_extraction() {
        let case = test_case();
        let fields = vec![
            field(case.uuid, "avg_monthly_balance", "50000", 0.9, FieldSource::Extraction),
            field(case.uuid, "avg_monthly_balance", "81500", 1.0, FieldSource::External),
        ];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.avg_monthly_balance, Some(81_500.0));
    }

    #[test]
    fn test_low_confidence_used_only_as_last_resort() {
        let case = test_case();
        let fields = vec![field(case.uuid, "pan", "ABCPE1234F", 0.3, FieldSource::Extraction)];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.pan.as_deref(), Some("ABCPE1234F"));

        let fields = vec![
            field(case.uuid, "pan", "WRONG", 0.3, FieldSource::Extraction),
            field(case.uuid, "pan", "ABCPE1234F", 0.8, FieldSource::Extraction),
        ];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.pan.as_deref(), Some("ABCPE1234F"));
    }

    #[test]
    fn test_turnover_derivation() {
        let case = test_case();
        let fields = vec![field(
            case.uuid,
            "monthly_credit_avg",
            "500000",
            1.0,
            FieldSource::External,
        )];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.monthly_turnover, Some(500_000.0));
        assert_eq!(v.annual_turnover, Some(6_000_000.0));
    }

    #[test]
    fn test_unparseable_leaves_null() {
        let case = test_case();
        let fields = vec![field(case.uuid, "dob", "not a date", 0.9, FieldSource::Extraction)];
        let v = assemble(&case, &fields, case.created_at);
        assert_eq!(v.dob, None);
        assert_eq!(v.filled_count(), 0);
    }

    #[test]
    fn test_assembly_idempotent() {
        let case = test_case();
        let fields = vec![
            field(case.uuid, "cibil_score", "720", 0.9, FieldSource::Extraction),
            field(case.uuid, "annual_turnover", "7500000", 0.75, FieldSource::Extraction),
        ];
        let a = assemble(&case, &fields, case.created_at);
        let b = assemble(&case, &fields, case.created_at);
        assert_eq!(a, b);
    }

    #[test]
    fn test_vintage_from_registration_date() {
        let case = test_case();
        let fields = vec![field(
            case.uuid,
            "gst_registration_date",
            "2021-01-01",
            0.85,
            FieldSource::Extraction,
        )];
        let v = assemble(&case, &fields, case.created_at);
        let vintage = v.business_vintage_years.unwrap();
        assert!((vintage - 5.0).abs() < 0.05, "vintage {vintage}");
    }
}
