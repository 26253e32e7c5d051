//! SQLite persistence layer
//!
//! A single write connection in WAL mode behind a lock, with closure-style
//! access helpers and idempotent numbered migrations applied at open. Query
//! modules own their SQL; nothing outside this module touches a raw
//! `Connection`.

pub mod cases;
pub mod copilot;
pub mod documents;
pub mod eligibility;
pub mod features;
pub mod fields;
pub mod jobs;
pub mod lenders;
pub mod reports;

use std::path::Path;

use lendcase_core::error::{CaseError, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

/// Convert a rusqlite error into the internal taxonomy
pub(crate) fn sqe(e: impl std::fmt::Display) -> CaseError {
    CaseError::internal(format!("database: {e}"))
}

/// The schema, applied in order; each statement is idempotent
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS cases (
        uuid TEXT PRIMARY KEY,
        case_id TEXT NOT NULL UNIQUE,
        operator_id TEXT NOT NULL,
        borrower_name TEXT NOT NULL,
        program_type TEXT NOT NULL,
        status TEXT NOT NULL,
        overrides TEXT NOT NULL DEFAULT '{}',
        gstin TEXT,
        address TEXT,
        entity_type TEXT,
        pincode TEXT,
        business_vintage_years REAL,
        annual_turnover REAL,
        gstin_response TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_cases_operator ON cases(operator_id, deleted)",
    "CREATE TABLE IF NOT EXISTS case_counters (
        day TEXT PRIMARY KEY,
        next INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        storage_key TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        extension TEXT NOT NULL,
        doc_type TEXT,
        classification_confidence REAL,
        classification_method TEXT,
        ocr_text TEXT,
        page_count INTEGER,
        status TEXT NOT NULL,
        failure_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (case_id, content_hash)
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_case ON documents(case_id)",
    "CREATE TABLE IF NOT EXISTS extracted_fields (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        document_id TEXT,
        field_name TEXT NOT NULL,
        field_value TEXT NOT NULL,
        confidence REAL NOT NULL,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_fields_case ON extracted_fields(case_id, field_name)",
    "CREATE TABLE IF NOT EXISTS borrower_features (
        case_id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        feature_completeness REAL NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS lender_products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lender_name TEXT NOT NULL,
        product_name TEXT NOT NULL,
        program_type TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        policy_available INTEGER NOT NULL DEFAULT 1,
        min_cibil_score INTEGER,
        min_vintage_years REAL,
        min_turnover_annual REAL,
        min_abb REAL,
        age_min INTEGER,
        age_max INTEGER,
        max_ticket_size REAL,
        max_dpd_30plus INTEGER,
        eligible_entity_types TEXT NOT NULL DEFAULT '[]',
        required_documents TEXT NOT NULL DEFAULT '[]',
        enforces_pincode INTEGER NOT NULL DEFAULT 0,
        UNIQUE (lender_name, product_name)
    )",
    "CREATE TABLE IF NOT EXISTS lender_pincodes (
        lender_product_id INTEGER NOT NULL,
        pincode TEXT NOT NULL,
        PRIMARY KEY (lender_product_id, pincode)
    )",
    "CREATE TABLE IF NOT EXISTS eligibility_results (
        case_id TEXT NOT NULL,
        lender_product_id INTEGER NOT NULL,
        run_id TEXT NOT NULL,
        hard_filter_status TEXT NOT NULL,
        hard_filter_details TEXT NOT NULL,
        eligibility_score REAL,
        approval_probability TEXT NOT NULL,
        expected_ticket_min REAL,
        expected_ticket_max REAL,
        confidence REAL NOT NULL,
        missing_for_improvement TEXT NOT NULL,
        rank INTEGER,
        created_at TEXT NOT NULL,
        PRIMARY KEY (run_id, lender_product_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_eligibility_case ON eligibility_results(case_id, created_at)",
    "CREATE TABLE IF NOT EXISTS case_reports (
        id TEXT PRIMARY KEY,
        case_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        pdf_key TEXT NOT NULL,
        whatsapp_summary TEXT NOT NULL,
        generated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reports_case ON case_reports(case_id, generated_at)",
    "CREATE TABLE IF NOT EXISTS copilot_queries (
        id TEXT PRIMARY KEY,
        operator_id TEXT NOT NULL,
        case_id TEXT,
        query_text TEXT NOT NULL,
        detected_type TEXT NOT NULL,
        retrieved_sources TEXT NOT NULL,
        response_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_copilot_operator ON copilot_queries(operator_id, created_at)",
    "CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        case_id TEXT NOT NULL,
        payload TEXT NOT NULL DEFAULT '{}',
        attempts INTEGER NOT NULL DEFAULT 0,
        state TEXT NOT NULL DEFAULT 'queued',
        error TEXT,
        not_before TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_jobs_poll ON jobs(state, not_before)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_case ON jobs(case_id, state)",
];

/// Database handle shared across handlers and workers
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a file-backed database, applying pragmas and migrations
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(sqe)?;
        Self::init(conn)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sqe)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").map_err(sqe)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(sqe)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(sqe)?;
        conn.pragma_update(None, "busy_timeout", 5000).map_err(sqe)?;
        for (i, stmt) in MIGRATIONS.iter().enumerate() {
            conn.execute(stmt, [])
                .map_err(|e| CaseError::internal(format!("migration {i}: {e}")))?;
        }
        info!(migrations = MIGRATIONS.len(), "database ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run a read-only closure against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a closure inside an IMMEDIATE transaction; commits on Ok,
    /// rolls back on Err
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(sqe)?;
        let out = f(&tx)?;
        tx.commit().map_err(sqe)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_twice() {
        let db = Database::open_in_memory().unwrap();
        // Re-applying the schema must be a no-op
        db.with_conn(|conn| {
            for stmt in MIGRATIONS {
                conn.execute(stmt, []).map_err(sqe)?;
            }
            Ok(())
        })
        .unwrap();
    }
}
