//! cases table queries

use chrono::{DateTime, NaiveDate, Utc};
use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::{format_case_id, Case, CaseStatus, EntityType, ProgramType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::sqe;

/// Take the next daily sequence number and format the case id.
///
/// Must run inside an IMMEDIATE transaction so concurrent creates serialize
/// on the counter row.
pub fn next_case_id(conn: &Connection, day: NaiveDate) -> Result<String> {
    let key = day.format("%Y%m%d").to_string();
    conn.execute(
        "INSERT INTO case_counters (day, next) VALUES (?1, 1)
         ON CONFLICT(day) DO UPDATE SET next = next + 1",
        params![key],
    )
    .map_err(sqe)?;
    let seq: u32 = conn
        .query_row("SELECT next FROM case_counters WHERE day = ?1", params![key], |r| {
            r.get(0)
        })
        .map_err(sqe)?;
    Ok(format_case_id(day, seq))
}

/// Insert a freshly created case
pub fn insert(conn: &Connection, case: &Case) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO cases
         (uuid, case_id, operator_id, borrower_name, program_type, status, overrides,
          gstin, address, entity_type, pincode, business_vintage_years, annual_turnover,
          gstin_response, deleted, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )
    .map_err(sqe)?
    .execute(params![
        case.uuid.to_string(),
        case.case_id,
        case.operator_id,
        case.borrower_name,
        case.program_type.as_str(),
        case.status.as_str(),
        serde_json::Value::Object(case.overrides.clone()).to_string(),
        case.gstin,
        case.address,
        case.entity_type.map(|e| e.as_str()),
        case.pincode,
        case.business_vintage_years,
        case.annual_turnover,
        case.gstin_response.as_ref().map(|v| v.to_string()),
        case.deleted as i64,
        case.created_at.to_rfc3339(),
        case.updated_at.to_rfc3339(),
    ])
    .map_err(sqe)?;
    Ok(())
}

const SELECT_COLS: &str = "uuid, case_id, operator_id, borrower_name, program_type, status,
    overrides, gstin, address, entity_type, pincode, business_vintage_years,
    annual_turnover, gstin_response, deleted, created_at, updated_at";

fn row_to_case(row: &Row<'_>) -> rusqlite::Result<Case> {
    let uuid: String = row.get(0)?;
    let program: String = row.get(4)?;
    let status: String = row.get(5)?;
    let overrides: String = row.get(6)?;
    let entity: Option<String> = row.get(9)?;
    let gstin_response: Option<String> = row.get(13)?;
    let created: String = row.get(15)?;
    let updated: String = row.get(16)?;
    Ok(Case {
        uuid: uuid.parse().unwrap_or_default(),
        case_id: row.get(1)?,
        operator_id: row.get(2)?,
        borrower_name: row.get(3)?,
        program_type: ProgramType::parse(&program).unwrap_or(ProgramType::Banking),
        status: CaseStatus::parse(&status).unwrap_or(CaseStatus::Created),
        overrides: serde_json::from_str::<serde_json::Value>(&overrides)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default(),
        gstin: row.get(7)?,
        address: row.get(8)?,
        entity_type: entity.as_deref().and_then(EntityType::parse),
        pincode: row.get(10)?,
        business_vintage_years: row.get(11)?,
        annual_turnover: row.get(12)?,
        gstin_response: gstin_response.and_then(|s| serde_json::from_str(&s).ok()),
        deleted: row.get::<_, i64>(14)? != 0,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Fetch by the human-facing case id; excludes soft-deleted cases
pub fn get_by_case_id(conn: &Connection, case_id: &str) -> Result<Option<Case>> {
    conn.prepare_cached(&format!(
        "SELECT {SELECT_COLS} FROM cases WHERE case_id = ?1 AND deleted = 0"
    ))
    .map_err(sqe)?
    .query_row(params![case_id], row_to_case)
    .optional()
    .map_err(sqe)
}

/// Fetch by internal uuid, regardless of deletion
pub fn get_by_uuid(conn: &Connection, uuid: Uuid) -> Result<Option<Case>> {
    conn.prepare_cached(&format!("SELECT {SELECT_COLS} FROM cases WHERE uuid = ?1"))
        .map_err(sqe)?
        .query_row(params![uuid.to_string()], row_to_case)
        .optional()
        .map_err(sqe)
}

/// Resolve a case an operator may act on, or a taxonomy error
pub fn require_for_operator(conn: &Connection, case_id: &str, operator_id: &str) -> Result<Case> {
    let case = get_by_case_id(conn, case_id)?
        .ok_or_else(|| CaseError::not_found("Case", case_id))?;
    if case.operator_id != operator_id {
        return Err(CaseError::not_found("Case", case_id));
    }
    Ok(case)
}

/// All live cases owned by an operator, newest first
pub fn list_for_operator(conn: &Connection, operator_id: &str) -> Result<Vec<Case>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM cases
             WHERE operator_id = ?1 AND deleted = 0 ORDER BY created_at DESC"
        ))
        .map_err(sqe)?;
    let rows = stmt.query_map(params![operator_id], row_to_case).map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Advance a case's status monotonically
pub fn advance_status(conn: &Connection, uuid: Uuid, next: CaseStatus, now: DateTime<Utc>) -> Result<()> {
    let current = get_by_uuid(conn, uuid)?
        .ok_or_else(|| CaseError::not_found("Case", uuid.to_string()))?;
    let advanced = current.status.advanced_to(next);
    if advanced != current.status {
        conn.prepare_cached("UPDATE cases SET status = ?1, updated_at = ?2 WHERE uuid = ?3")
            .map_err(sqe)?
            .execute(params![advanced.as_str(), now.to_rfc3339(), uuid.to_string()])
            .map_err(sqe)?;
    }
    Ok(())
}

/// Persist enricher-derived fields and the cached GSTIN response
pub fn update_derived(conn: &Connection, case: &Case, now: DateTime<Utc>) -> Result<()> {
    conn.prepare_cached(
        "UPDATE cases SET gstin = ?1, address = ?2, entity_type = ?3, pincode = ?4,
         business_vintage_years = ?5, annual_turnover = ?6, gstin_response = ?7,
         updated_at = ?8 WHERE uuid = ?9",
    )
    .map_err(sqe)?
    .execute(params![
        case.gstin,
        case.address,
        case.entity_type.map(|e| e.as_str()),
        case.pincode,
        case.business_vintage_years,
        case.annual_turnover,
        case.gstin_response.as_ref().map(|v| v.to_string()),
        now.to_rfc3339(),
        case.uuid.to_string(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Soft-delete a case; document rows and blobs are retained for audit
pub fn soft_delete(conn: &Connection, uuid: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.prepare_cached("UPDATE cases SET deleted = 1, updated_at = ?1 WHERE uuid = ?2")
        .map_err(sqe)?
        .execute(params![now.to_rfc3339(), uuid.to_string()])
        .map_err(sqe)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_daily_counter_serializes() {
        let db = Database::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let a = db.with_tx(|tx| next_case_id(tx, day)).unwrap();
        let b = db.with_tx(|tx| next_case_id(tx, day)).unwrap();
        assert_eq!(a, "CASE-20260101-0001");
        assert_eq!(b, "CASE-20260101-0002");
        // A new day resets the sequence
        let other = db
            .with_tx(|tx| next_case_id(tx, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()))
            .unwrap();
        assert_eq!(other, "CASE-20260102-0001");
    }

    #[test]
    fn test_insert_round_trip_and_ownership() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let case = Case::new("CASE-20260101-0001".into(), "op-1", "Ravi", ProgramType::Gst, now);
        db.with_conn(|c| insert(c, &case)).unwrap();

        let got = db
            .with_conn(|c| get_by_case_id(c, "CASE-20260101-0001"))
            .unwrap()
            .unwrap();
        assert_eq!(got.uuid, case.uuid);
        assert_eq!(got.program_type, ProgramType::Gst);

        let err = db
            .with_conn(|c| require_for_operator(c, "CASE-20260101-0001", "op-2"))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_status_never_regresses() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let case = Case::new("CASE-20260101-0001".into(), "op-1", "Ravi", ProgramType::Banking, now);
        db.with_conn(|c| insert(c, &case)).unwrap();
        db.with_conn(|c| advance_status(c, case.uuid, CaseStatus::EligibilityScored, now))
            .unwrap();
        db.with_conn(|c| advance_status(c, case.uuid, CaseStatus::Processing, now))
            .unwrap();
        let got = db.with_conn(|c| get_by_uuid(c, case.uuid)).unwrap().unwrap();
        assert_eq!(got.status, CaseStatus::EligibilityScored);
    }
}
