//! extracted_fields table queries

use lendcase_core::error::Result;
use lendcase_core::model::{ExtractedField, FieldSource};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

fn row_to_field(row: &Row<'_>) -> rusqlite::Result<ExtractedField> {
    let id: String = row.get(0)?;
    let case_id: String = row.get(1)?;
    let document_id: Option<String> = row.get(2)?;
    let source: String = row.get(6)?;
    let created: String = row.get(7)?;
    Ok(ExtractedField {
        id: id.parse().unwrap_or_default(),
        case_id: case_id.parse().unwrap_or_default(),
        document_id: document_id.and_then(|s| s.parse().ok()),
        field_name: row.get(3)?,
        field_value: row.get(4)?,
        confidence: row.get(5)?,
        source: FieldSource::parse(&source).unwrap_or(FieldSource::Extraction),
        created_at: parse_ts(&created),
    })
}

/// Insert a batch of field rows
pub fn insert_all(conn: &Connection, fields: &[ExtractedField]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO extracted_fields
             (id, case_id, document_id, field_name, field_value, confidence, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(sqe)?;
    for f in fields {
        stmt.execute(params![
            f.id.to_string(),
            f.case_id.to_string(),
            f.document_id.map(|d| d.to_string()),
            f.field_name,
            f.field_value,
            f.confidence,
            f.source.as_str(),
            f.created_at.to_rfc3339(),
        ])
        .map_err(sqe)?;
    }
    Ok(fields.len())
}

/// All field rows for a case, insertion order
pub fn list_for_case(conn: &Connection, case_id: Uuid) -> Result<Vec<ExtractedField>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, case_id, document_id, field_name, field_value, confidence, source, created_at
             FROM extracted_fields WHERE case_id = ?1 ORDER BY created_at, id",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![case_id.to_string()], row_to_field)
        .map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Replace a document's extraction rows; re-extraction stays idempotent
pub fn delete_for_document(conn: &Connection, document_id: Uuid) -> Result<usize> {
    conn.prepare_cached("DELETE FROM extracted_fields WHERE document_id = ?1 AND source = 'extraction'")
        .map_err(sqe)?
        .execute(params![document_id.to_string()])
        .map_err(sqe)
}

/// Replace enricher rows for a case before re-running enrichment
pub fn delete_external_for_case(conn: &Connection, case_id: Uuid) -> Result<usize> {
    conn.prepare_cached("DELETE FROM extracted_fields WHERE case_id = ?1 AND source = 'external'")
        .map_err(sqe)?
        .execute(params![case_id.to_string()])
        .map_err(sqe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;

    #[test]
    fn test_insert_and_replace_for_document() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let doc_id = Uuid::new_v4();
        let now = Utc::now();
        let rows = vec![
            ExtractedField::extracted(case_id, doc_id, "pan", "ABCPE1234F", 0.95, now),
            ExtractedField::extracted(case_id, doc_id, "dob", "1990-06-15", 0.85, now),
        ];
        db.with_conn(|c| insert_all(c, &rows)).unwrap();
        assert_eq!(db.with_conn(|c| list_for_case(c, case_id)).unwrap().len(), 2);

        db.with_conn(|c| delete_for_document(c, doc_id)).unwrap();
        assert!(db.with_conn(|c| list_for_case(c, case_id)).unwrap().is_empty());
    }
}
