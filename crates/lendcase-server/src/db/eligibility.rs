//! eligibility_results table queries
//!
//! Runs are append-only: each evaluation writes a full row set under a fresh
//! run_id and old runs are retained for audit.

use lendcase_core::error::Result;
use lendcase_core::model::{ApprovalProbability, EligibilityResult, HardFilterStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<EligibilityResult> {
    let case_id: String = row.get(0)?;
    let run_id: String = row.get(2)?;
    let status: String = row.get(3)?;
    let details: String = row.get(4)?;
    let probability: String = row.get(6)?;
    let missing: String = row.get(10)?;
    let created: String = row.get(12)?;
    Ok(EligibilityResult {
        case_id: case_id.parse().unwrap_or_default(),
        lender_product_id: row.get(1)?,
        run_id: run_id.parse().unwrap_or_default(),
        hard_filter_status: HardFilterStatus::parse(&status).unwrap_or(HardFilterStatus::Fail),
        hard_filter_details: serde_json::from_str(&details).unwrap_or_default(),
        eligibility_score: row.get(5)?,
        approval_probability: ApprovalProbability::parse(&probability)
            .unwrap_or(ApprovalProbability::None),
        expected_ticket_min: row.get(7)?,
        expected_ticket_max: row.get(8)?,
        confidence: row.get(9)?,
        missing_for_improvement: serde_json::from_str(&missing).unwrap_or_default(),
        rank: row.get::<_, Option<i64>>(11)?.map(|n| n as u32),
        created_at: parse_ts(&created),
    })
}

/// Write a full run atomically. Call inside a transaction.
pub fn insert_run(conn: &Connection, rows: &[EligibilityResult]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO eligibility_results
             (case_id, lender_product_id, run_id, hard_filter_status, hard_filter_details,
              eligibility_score, approval_probability, expected_ticket_min, expected_ticket_max,
              confidence, missing_for_improvement, rank, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .map_err(sqe)?;
    for r in rows {
        stmt.execute(params![
            r.case_id.to_string(),
            r.lender_product_id,
            r.run_id.to_string(),
            r.hard_filter_status.as_str(),
            serde_json::to_string(&r.hard_filter_details).map_err(sqe)?,
            r.eligibility_score,
            r.approval_probability.as_str(),
            r.expected_ticket_min,
            r.expected_ticket_max,
            r.confidence,
            serde_json::to_string(&r.missing_for_improvement).map_err(sqe)?,
            r.rank.map(|n| n as i64),
            r.created_at.to_rfc3339(),
        ])
        .map_err(sqe)?;
    }
    Ok(rows.len())
}

/// The most recent run_id for a case, if any run exists
pub fn latest_run_id(conn: &Connection, case_id: Uuid) -> Result<Option<Uuid>> {
    let run: Option<String> = conn
        .prepare_cached(
            "SELECT run_id FROM eligibility_results
             WHERE case_id = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .map_err(sqe)?
        .query_row(params![case_id.to_string()], |r| r.get(0))
        .optional()
        .map_err(sqe)?;
    Ok(run.and_then(|s| s.parse().ok()))
}

/// All rows of one run, PASS rows ranked first
pub fn list_run(conn: &Connection, case_id: Uuid, run_id: Uuid) -> Result<Vec<EligibilityResult>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT case_id, lender_product_id, run_id, hard_filter_status, hard_filter_details,
                    eligibility_score, approval_probability, expected_ticket_min,
                    expected_ticket_max, confidence, missing_for_improvement, rank, created_at
             FROM eligibility_results
             WHERE case_id = ?1 AND run_id = ?2
             ORDER BY rank IS NULL, rank, lender_product_id",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![case_id.to_string(), run_id.to_string()], row_to_result)
        .map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn result(case_id: Uuid, run_id: Uuid, product: i64, rank: Option<u32>) -> EligibilityResult {
        EligibilityResult {
            case_id,
            lender_product_id: product,
            run_id,
            hard_filter_status: if rank.is_some() {
                HardFilterStatus::Pass
            } else {
                HardFilterStatus::Fail
            },
            hard_filter_details: BTreeMap::new(),
            eligibility_score: rank.map(|_| 80.0),
            approval_probability: ApprovalProbability::High,
            expected_ticket_min: None,
            expected_ticket_max: None,
            confidence: 0.8,
            missing_for_improvement: vec![],
            rank,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_runs_are_append_only() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let run1 = Uuid::new_v4();
        let run2 = Uuid::new_v4();
        db.with_tx(|tx| insert_run(tx, &[result(case_id, run1, 1, Some(1))])).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.with_tx(|tx| {
            insert_run(
                tx,
                &[result(case_id, run2, 1, Some(1)), result(case_id, run2, 2, None)],
            )
        })
        .unwrap();

        let latest = db.with_conn(|c| latest_run_id(c, case_id)).unwrap().unwrap();
        assert_eq!(latest, run2);
        let rows = db.with_conn(|c| list_run(c, case_id, run2)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, Some(1));
        assert_eq!(rows[1].rank, None);
        // The first run is still readable
        assert_eq!(db.with_conn(|c| list_run(c, case_id, run1)).unwrap().len(), 1);
    }
}
