//! Typed value parsing for extracted strings
//!
//! Tolerates the formats that actually appear in Indian financial documents:
//! Indian digit grouping for amounts, dd/mm/yyyy and dd-mm-yyyy dates.

use chrono::NaiveDate;

/// Parse an amount, tolerating Indian grouping (`1,25,00,000` → 12 500 000),
/// currency markers and trailing noise.
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches(['₹'])
        .trim_start_matches("Rs.")
        .trim_start_matches("Rs")
        .trim_start_matches("INR")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() || cleaned == "." {
        return None;
    }
    // A second dot means this was never a number
    if cleaned.matches('.').count() > 1 {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse dd/mm/yyyy or dd-mm-yyyy into a calendar date
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    for fmt in ["%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d);
        }
    }
    // ISO form shows up in normalized fields and enricher payloads
    NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()
}

/// Parse an integer out of a possibly grouped string
pub fn parse_int(s: &str) -> Option<i64> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_grouping() {
        assert_eq!(parse_amount("1,25,00,000"), Some(12_500_000.0));
        assert_eq!(parse_amount("₹ 5,00,000.50"), Some(500_000.50));
        assert_eq!(parse_amount("Rs. 75,000"), Some(75_000.0));
        assert_eq!(parse_amount("12500"), Some(12_500.0));
    }

    #[test]
    fn test_amount_rejects_noise() {
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_dates_both_separators() {
        let expected = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(parse_date("15/06/1990"), Some(expected));
        assert_eq!(parse_date("15-06-1990"), Some(expected));
        assert_eq!(parse_date("1990-06-15"), Some(expected));
        assert_eq!(parse_date("31/02/2020"), None);
    }
}
