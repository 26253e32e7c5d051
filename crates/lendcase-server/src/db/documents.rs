//! documents table queries

use chrono::{DateTime, Utc};
use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::{ClassifyMethod, Document, DocumentStatus, DocumentType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

const SELECT_COLS: &str = "id, case_id, storage_key, original_filename, content_hash,
    size_bytes, extension, doc_type, classification_confidence, classification_method,
    ocr_text, page_count, status, failure_reason, created_at, updated_at";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let case_id: String = row.get(1)?;
    let doc_type: Option<String> = row.get(7)?;
    let method: Option<String> = row.get(9)?;
    let status: String = row.get(12)?;
    let created: String = row.get(14)?;
    let updated: String = row.get(15)?;
    Ok(Document {
        id: id.parse().unwrap_or_default(),
        case_id: case_id.parse().unwrap_or_default(),
        storage_key: row.get(2)?,
        original_filename: row.get(3)?,
        content_hash: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        extension: row.get(6)?,
        doc_type: doc_type.as_deref().and_then(DocumentType::parse),
        classification_confidence: row.get(8)?,
        classification_method: method.and_then(|m| match m.as_str() {
            "filename" => Some(ClassifyMethod::Filename),
            "keyword" => Some(ClassifyMethod::Keyword),
            "model" => Some(ClassifyMethod::Model),
            "hybrid" => Some(ClassifyMethod::Hybrid),
            _ => None,
        }),
        ocr_text: row.get(10)?,
        page_count: row.get::<_, Option<i64>>(11)?.map(|n| n as u32),
        status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Uploaded),
        failure_reason: row.get(13)?,
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

/// Insert a new document row. A (case, hash) collision surfaces as the
/// Duplicate taxonomy error carrying the existing document id.
pub fn insert(conn: &Connection, doc: &Document) -> Result<()> {
    let result = conn
        .prepare_cached(
            "INSERT INTO documents
             (id, case_id, storage_key, original_filename, content_hash, size_bytes,
              extension, doc_type, classification_confidence, classification_method,
              ocr_text, page_count, status, failure_reason, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .map_err(sqe)?
        .execute(params![
            doc.id.to_string(),
            doc.case_id.to_string(),
            doc.storage_key,
            doc.original_filename,
            doc.content_hash,
            doc.size_bytes as i64,
            doc.extension,
            doc.doc_type.map(|t| t.as_str()),
            doc.classification_confidence,
            doc.classification_method.map(method_str),
            doc.ocr_text,
            doc.page_count.map(|n| n as i64),
            doc.status.as_str(),
            doc.failure_reason,
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ]);
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let existing = find_by_hash(conn, doc.case_id, &doc.content_hash)?
                .map(|d| d.id.to_string())
                .unwrap_or_default();
            Err(CaseError::duplicate(doc.content_hash.clone(), existing))
        }
        Err(e) => Err(sqe(e)),
    }
}

fn method_str(m: ClassifyMethod) -> &'static str {
    match m {
        ClassifyMethod::Filename => "filename",
        ClassifyMethod::Keyword => "keyword",
        ClassifyMethod::Model => "model",
        ClassifyMethod::Hybrid => "hybrid",
    }
}

/// Find a document in a case by content hash
pub fn find_by_hash(conn: &Connection, case_id: Uuid, hash: &str) -> Result<Option<Document>> {
    conn.prepare_cached(&format!(
        "SELECT {SELECT_COLS} FROM documents WHERE case_id = ?1 AND content_hash = ?2"
    ))
    .map_err(sqe)?
    .query_row(params![case_id.to_string(), hash], row_to_document)
    .optional()
    .map_err(sqe)
}

/// Fetch one document
pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Document>> {
    conn.prepare_cached(&format!("SELECT {SELECT_COLS} FROM documents WHERE id = ?1"))
        .map_err(sqe)?
        .query_row(params![id.to_string()], row_to_document)
        .optional()
        .map_err(sqe)
}

/// All documents of a case, upload order
pub fn list_for_case(conn: &Connection, case_id: Uuid) -> Result<Vec<Document>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM documents WHERE case_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![case_id.to_string()], row_to_document)
        .map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Store OCR output and advance to OCR_COMPLETE
pub fn set_ocr_result(
    conn: &Connection,
    id: Uuid,
    ocr_text: &str,
    page_count: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.prepare_cached(
        "UPDATE documents SET ocr_text = ?1, page_count = ?2, status = ?3, updated_at = ?4
         WHERE id = ?5",
    )
    .map_err(sqe)?
    .execute(params![
        ocr_text,
        page_count as i64,
        DocumentStatus::OcrComplete.as_str(),
        now.to_rfc3339(),
        id.to_string(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Store classification output and advance to CLASSIFIED
pub fn set_classification(
    conn: &Connection,
    id: Uuid,
    doc_type: DocumentType,
    confidence: f64,
    method: ClassifyMethod,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.prepare_cached(
        "UPDATE documents SET doc_type = ?1, classification_confidence = ?2,
         classification_method = ?3, status = ?4, updated_at = ?5 WHERE id = ?6",
    )
    .map_err(sqe)?
    .execute(params![
        doc_type.as_str(),
        confidence,
        method_str(method),
        DocumentStatus::Classified.as_str(),
        now.to_rfc3339(),
        id.to_string(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Advance a document to a terminal or intermediate status
pub fn set_status(
    conn: &Connection,
    id: Uuid,
    status: DocumentStatus,
    failure_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.prepare_cached(
        "UPDATE documents SET status = ?1, failure_reason = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .map_err(sqe)?
    .execute(params![status.as_str(), failure_reason, now.to_rfc3339(), id.to_string()])
    .map_err(sqe)?;
    Ok(())
}

/// Whether every document of a case is in a terminal state
pub fn all_terminal(conn: &Connection, case_id: Uuid) -> Result<bool> {
    let open: i64 = conn
        .prepare_cached(
            "SELECT COUNT(*) FROM documents
             WHERE case_id = ?1 AND status NOT IN ('EXTRACTED', 'FAILED')",
        )
        .map_err(sqe)?
        .query_row(params![case_id.to_string()], |r| r.get(0))
        .map_err(sqe)?;
    Ok(open == 0)
}
