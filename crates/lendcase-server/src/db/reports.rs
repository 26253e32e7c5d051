//! case_reports table queries

use lendcase_core::error::Result;
use lendcase_core::model::CaseReport;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

fn row_to_report(row: &Row<'_>) -> rusqlite::Result<CaseReport> {
    let id: String = row.get(0)?;
    let case_id: String = row.get(1)?;
    let payload: String = row.get(2)?;
    let generated: String = row.get(5)?;
    let payload = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(CaseReport {
        id: id.parse().unwrap_or_default(),
        case_id: case_id.parse().unwrap_or_default(),
        payload,
        pdf_key: row.get(3)?,
        whatsapp_summary: row.get(4)?,
        generated_at: parse_ts(&generated),
    })
}

/// Insert a generated report
pub fn insert(conn: &Connection, report: &CaseReport) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO case_reports (id, case_id, payload, pdf_key, whatsapp_summary, generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .map_err(sqe)?
    .execute(params![
        report.id.to_string(),
        report.case_id.to_string(),
        serde_json::to_string(&report.payload).map_err(sqe)?,
        report.pdf_key,
        report.whatsapp_summary,
        report.generated_at.to_rfc3339(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// The most recent report for a case
pub fn latest_for_case(conn: &Connection, case_id: Uuid) -> Result<Option<CaseReport>> {
    conn.prepare_cached(
        "SELECT id, case_id, payload, pdf_key, whatsapp_summary, generated_at
         FROM case_reports WHERE case_id = ?1 ORDER BY generated_at DESC LIMIT 1",
    )
    .map_err(sqe)?
    .query_row(params![case_id.to_string()], row_to_report)
    .optional()
    .map_err(sqe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;
    use lendcase_core::model::{BorrowerSnapshot, CaseReportData, DocumentChecklist};

    #[test]
    fn test_latest_report_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let report = CaseReport {
            id: Uuid::new_v4(),
            case_id,
            payload: CaseReportData {
                case_id: "CASE-20260101-0001".to_string(),
                borrower: BorrowerSnapshot {
                    borrower_name: "Ravi".to_string(),
                    entity_type: None,
                    gstin: None,
                    pincode: None,
                    business_vintage_years: None,
                    cibil_score: Some(720),
                    annual_turnover: None,
                    avg_monthly_balance: None,
                    feature_completeness: 60.0,
                },
                checklist: DocumentChecklist {
                    present: vec![],
                    missing: vec![],
                    unreadable: vec![],
                    completeness_score: 0.0,
                },
                strengths: vec![],
                risk_flags: vec![],
                top_matches: vec![],
                strategy: vec![],
                advisory: vec![],
                expected_loan_min: None,
                expected_loan_max: None,
                lenders_evaluated: 0,
                lenders_passed: 0,
            },
            pdf_key: format!("cases/{case_id}/reports/r.pdf"),
            whatsapp_summary: "digest".to_string(),
            generated_at: Utc::now(),
        };
        db.with_conn(|c| insert(c, &report)).unwrap();
        let got = db.with_conn(|c| latest_for_case(c, case_id)).unwrap().unwrap();
        assert_eq!(got.payload.borrower.cibil_score, Some(720));
    }
}
