//! jobs table — the durable pipeline queue
//!
//! Workers claim the oldest runnable job under the write lock, so a claim is
//! race-free across workers. Hand-off between stages happens only through
//! committed rows here.

use chrono::{DateTime, Duration, Utc};
use lendcase_core::error::Result;
use lendcase_core::model::{JobKind, JobState};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

/// One queued unit of pipeline work
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub kind: JobKind,
    pub case_id: Uuid,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub state: JobState,
    pub error: Option<String>,
    pub not_before: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let kind: String = row.get(1)?;
    let case_id: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let state: String = row.get(5)?;
    let not_before: String = row.get(7)?;
    let created: String = row.get(8)?;
    Ok(JobRecord {
        id: row.get(0)?,
        kind: JobKind::parse(&kind).unwrap_or(JobKind::Cascade),
        case_id: case_id.parse().unwrap_or_default(),
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        attempts: row.get::<_, i64>(4)? as u32,
        state: JobState::parse(&state).unwrap_or(JobState::Failed),
        error: row.get(6)?,
        not_before: parse_ts(&not_before),
        created_at: parse_ts(&created),
    })
}

const SELECT_COLS: &str =
    "id, kind, case_id, payload, attempts, state, error, not_before, created_at";

/// Enqueue a job
pub fn enqueue(
    conn: &Connection,
    kind: JobKind,
    case_id: Uuid,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO jobs (kind, case_id, payload, state, not_before, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'queued', ?4, ?4, ?4)",
    )
    .map_err(sqe)?
    .execute(params![
        kind.as_str(),
        case_id.to_string(),
        payload.to_string(),
        now.to_rfc3339(),
    ])
    .map_err(sqe)?;
    Ok(conn.last_insert_rowid())
}

/// Enqueue unless a live job of the same kind already exists for the case.
///
/// Used for cascade and eligibility jobs: concurrent triggers coalesce onto
/// the pending one instead of fanning out duplicates.
pub fn enqueue_coalesced(
    conn: &Connection,
    kind: JobKind,
    case_id: Uuid,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let live: i64 = conn
        .prepare_cached(
            "SELECT COUNT(*) FROM jobs
             WHERE case_id = ?1 AND kind = ?2 AND state IN ('queued', 'running')",
        )
        .map_err(sqe)?
        .query_row(params![case_id.to_string(), kind.as_str()], |r| r.get(0))
        .map_err(sqe)?;
    if live > 0 {
        return Ok(None);
    }
    enqueue(conn, kind, case_id, payload, now).map(Some)
}

/// Claim the oldest runnable job and mark it running.
///
/// Must run inside an IMMEDIATE transaction so at most one worker wins.
pub fn claim_next(conn: &Connection, now: DateTime<Utc>) -> Result<Option<JobRecord>> {
    let job = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM jobs
             WHERE state = 'queued' AND not_before <= ?1
             ORDER BY not_before, id LIMIT 1"
        ))
        .map_err(sqe)?
        .query_row(params![now.to_rfc3339()], row_to_job)
        .optional()
        .map_err(sqe)?;
    let Some(mut job) = job else {
        return Ok(None);
    };
    conn.prepare_cached(
        "UPDATE jobs SET state = 'running', attempts = attempts + 1, updated_at = ?1
         WHERE id = ?2",
    )
    .map_err(sqe)?
    .execute(params![now.to_rfc3339(), job.id])
    .map_err(sqe)?;
    job.state = JobState::Running;
    job.attempts += 1;
    Ok(Some(job))
}

/// Mark a job succeeded
pub fn mark_succeeded(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    set_state(conn, id, JobState::Succeeded, None, now)
}

/// Mark a job cancelled
pub fn mark_cancelled(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    set_state(conn, id, JobState::Cancelled, None, now)
}

fn set_state(
    conn: &Connection,
    id: i64,
    state: JobState,
    error: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.prepare_cached("UPDATE jobs SET state = ?1, error = ?2, updated_at = ?3 WHERE id = ?4")
        .map_err(sqe)?
        .execute(params![state.as_str(), error, now.to_rfc3339(), id])
        .map_err(sqe)?;
    Ok(())
}

/// Fail a job, requeueing with exponential backoff while attempts remain and
/// the error class is retryable. Returns the state the job ended in.
pub fn fail_or_retry(
    conn: &Connection,
    job: &JobRecord,
    error: &str,
    retryable: bool,
    max_attempts: u32,
    backoff_base_secs: u64,
    now: DateTime<Utc>,
) -> Result<JobState> {
    if retryable && job.attempts < max_attempts {
        // base × 2^(attempt-1): 10s, 20s, 40s…
        let delay = backoff_base_secs.saturating_mul(1 << (job.attempts.saturating_sub(1).min(16)));
        let not_before = now + Duration::seconds(delay as i64);
        conn.prepare_cached(
            "UPDATE jobs SET state = 'queued', error = ?1, not_before = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .map_err(sqe)?
        .execute(params![error, not_before.to_rfc3339(), now.to_rfc3339(), job.id])
        .map_err(sqe)?;
        Ok(JobState::Queued)
    } else {
        set_state(conn, job.id, JobState::Failed, Some(error), now)?;
        Ok(JobState::Failed)
    }
}

/// Whether a running job has been cancelled under it. Workers check this
/// before committing side effects.
pub fn is_cancelled(conn: &Connection, id: i64) -> Result<bool> {
    let state: Option<String> = conn
        .prepare_cached("SELECT state FROM jobs WHERE id = ?1")
        .map_err(sqe)?
        .query_row(params![id], |r| r.get(0))
        .optional()
        .map_err(sqe)?;
    Ok(matches!(state.as_deref(), Some("cancelled") | None))
}

/// Cancel every non-terminal job for a case; returns how many were cancelled
pub fn cancel_for_case(conn: &Connection, case_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
    conn.prepare_cached(
        "UPDATE jobs SET state = 'cancelled', updated_at = ?1
         WHERE case_id = ?2 AND state IN ('queued', 'running')",
    )
    .map_err(sqe)?
    .execute(params![now.to_rfc3339(), case_id.to_string()])
    .map_err(sqe)
}

/// Job counts by kind × state for a case's progress view
pub fn counts_for_case(conn: &Connection, case_id: Uuid) -> Result<Vec<(String, String, i64)>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT kind, state, COUNT(*) FROM jobs WHERE case_id = ?1
             GROUP BY kind, state ORDER BY kind, state",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![case_id.to_string()], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
        })
        .map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Whether any document-level job for the case is still live
pub fn document_jobs_pending(conn: &Connection, case_id: Uuid) -> Result<bool> {
    let live: i64 = conn
        .prepare_cached(
            "SELECT COUNT(*) FROM jobs
             WHERE case_id = ?1 AND kind IN ('ocr', 'classify', 'extract')
               AND state IN ('queued', 'running')",
        )
        .map_err(sqe)?
        .query_row(params![case_id.to_string()], |r| r.get(0))
        .map_err(sqe)?;
    Ok(live > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_claim_marks_running_and_orders_fifo() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let now = Utc::now();
        db.with_conn(|c| enqueue(c, JobKind::Ocr, case_id, serde_json::json!({"doc": 1}), now))
            .unwrap();
        db.with_conn(|c| enqueue(c, JobKind::Ocr, case_id, serde_json::json!({"doc": 2}), now))
            .unwrap();

        let first = db.with_tx(|tx| claim_next(tx, now)).unwrap().unwrap();
        assert_eq!(first.state, JobState::Running);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.payload["doc"], 1);

        let second = db.with_tx(|tx| claim_next(tx, now)).unwrap().unwrap();
        assert_eq!(second.payload["doc"], 2);
        assert!(db.with_tx(|tx| claim_next(tx, now)).unwrap().is_none());
    }

    #[test]
    fn test_backoff_requeues_until_exhausted() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let now = Utc::now();
        db.with_conn(|c| enqueue(c, JobKind::AssembleFeatures, case_id, serde_json::json!({}), now))
            .unwrap();

        let job = db.with_tx(|tx| claim_next(tx, now)).unwrap().unwrap();
        let state = db
            .with_conn(|c| fail_or_retry(c, &job, "timeout", true, 3, 10, now))
            .unwrap();
        assert_eq!(state, JobState::Queued);
        // Backoff pushes not_before into the future, so nothing is runnable now
        assert!(db.with_tx(|tx| claim_next(tx, now)).unwrap().is_none());

        let later = now + Duration::seconds(11);
        let job = db.with_tx(|tx| claim_next(tx, later)).unwrap().unwrap();
        assert_eq!(job.attempts, 2);

        let much_later = later + Duration::seconds(21);
        let job = {
            db.with_conn(|c| fail_or_retry(c, &job, "timeout", true, 3, 10, later)).unwrap();
            db.with_tx(|tx| claim_next(tx, much_later)).unwrap().unwrap()
        };
        assert_eq!(job.attempts, 3);
        let state = db
            .with_conn(|c| fail_or_retry(c, &job, "timeout", true, 3, 10, much_later))
            .unwrap();
        assert_eq!(state, JobState::Failed);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.with_conn(|c| enqueue(c, JobKind::Ocr, Uuid::new_v4(), serde_json::json!({}), now))
            .unwrap();
        let job = db.with_tx(|tx| claim_next(tx, now)).unwrap().unwrap();
        let state = db
            .with_conn(|c| fail_or_retry(c, &job, "corrupt_file", false, 3, 10, now))
            .unwrap();
        assert_eq!(state, JobState::Failed);
    }

    #[test]
    fn test_coalesced_enqueue() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let now = Utc::now();
        let a = db
            .with_conn(|c| enqueue_coalesced(c, JobKind::Cascade, case_id, serde_json::json!({}), now))
            .unwrap();
        assert!(a.is_some());
        let b = db
            .with_conn(|c| enqueue_coalesced(c, JobKind::Cascade, case_id, serde_json::json!({}), now))
            .unwrap();
        assert!(b.is_none());
    }

    #[test]
    fn test_cancellation_empties_queue() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let now = Utc::now();
        db.with_conn(|c| enqueue(c, JobKind::Ocr, case_id, serde_json::json!({}), now)).unwrap();
        db.with_conn(|c| enqueue(c, JobKind::Classify, case_id, serde_json::json!({}), now))
            .unwrap();
        let n = db.with_conn(|c| cancel_for_case(c, case_id, now)).unwrap();
        assert_eq!(n, 2);
        assert!(db.with_tx(|tx| claim_next(tx, now)).unwrap().is_none());
    }
}
