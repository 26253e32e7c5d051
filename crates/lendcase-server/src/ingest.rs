//! Document ingester
//!
//! Expands archives, validates size and extension, de-duplicates by content
//! hash, persists blobs and Document rows, and enqueues one OCR job per new
//! document. Upload outcomes are reported per file; one bad file never sinks
//! the batch.

use std::io::Read;

use chrono::{DateTime, Utc};
use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::{Case, Document, DocumentStatus, JobKind};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{documents, jobs, Database};
use crate::storage::{content_hash, BlobStore};

/// Accepted upload extensions
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "tif", "tiff"];

/// Archive entries skipped during expansion
const IGNORED_NAMES: [&str; 2] = [".DS_Store", "Thumbs.db"];

/// Upload limits, taken from server configuration
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub max_file_bytes: u64,
    pub max_case_bytes: u64,
}

/// One successfully created document
#[derive(Debug, Serialize)]
pub struct CreatedDoc {
    pub doc_id: Uuid,
    pub filename: String,
}

/// A file whose content was already on the case
#[derive(Debug, Serialize)]
pub struct DuplicateDoc {
    pub doc_id: Uuid,
    pub filename: String,
}

/// A file rejected by validation
#[derive(Debug, Serialize)]
pub struct RejectedDoc {
    pub filename: String,
    pub reason: String,
}

/// Per-file outcomes of one upload batch
#[derive(Debug, Default, Serialize)]
pub struct IngestOutcome {
    pub created: Vec<CreatedDoc>,
    pub duplicates: Vec<DuplicateDoc>,
    pub rejected: Vec<RejectedDoc>,
}

/// Ingest a batch of uploaded items into a case
pub fn ingest(
    db: &Database,
    store: &BlobStore,
    case: &Case,
    items: Vec<(String, Vec<u8>)>,
    limits: IngestLimits,
    now: DateTime<Utc>,
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();
    let leaves = expand_all(items, &mut outcome);

    let mut case_bytes: u64 = db.with_conn(|conn| {
        documents::list_for_case(conn, case.uuid)
            .map(|docs| docs.iter().map(|d| d.size_bytes).sum())
    })?;

    for (filename, bytes) in leaves {
        match ingest_one(db, store, case, &filename, &bytes, limits, case_bytes, now) {
            Ok(FileOutcome::Created(doc_id)) => {
                case_bytes += bytes.len() as u64;
                outcome.created.push(CreatedDoc { doc_id, filename });
            }
            Ok(FileOutcome::Duplicate(doc_id)) => {
                outcome.duplicates.push(DuplicateDoc { doc_id, filename })
            }
            Err(CaseError::Validation { message }) => {
                outcome.rejected.push(RejectedDoc { filename, reason: message })
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        case_id = %case.case_id,
        created = outcome.created.len(),
        duplicates = outcome.duplicates.len(),
        rejected = outcome.rejected.len(),
        "upload batch ingested"
    );
    Ok(outcome)
}

enum FileOutcome {
    Created(Uuid),
    Duplicate(Uuid),
}

#[allow(clippy::too_many_arguments)]
fn ingest_one(
    db: &Database,
    store: &BlobStore,
    case: &Case,
    filename: &str,
    bytes: &[u8],
    limits: IngestLimits,
    case_bytes: u64,
    now: DateTime<Utc>,
) -> Result<FileOutcome> {
    let extension = extension_of(filename)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| {
            CaseError::validation(format!("'{filename}': unsupported file type"))
        })?;
    if bytes.is_empty() {
        return Err(CaseError::validation(format!("'{filename}': empty file")));
    }
    if bytes.len() as u64 > limits.max_file_bytes {
        return Err(CaseError::validation(format!(
            "'{filename}': {} bytes exceeds the {} byte per-file limit",
            bytes.len(),
            limits.max_file_bytes
        )));
    }
    if case_bytes + bytes.len() as u64 > limits.max_case_bytes {
        return Err(CaseError::validation(format!(
            "'{filename}': case upload budget of {} bytes exhausted",
            limits.max_case_bytes
        )));
    }

    let hash = content_hash(bytes);
    if let Some(existing) = db.with_conn(|c| documents::find_by_hash(c, case.uuid, &hash))? {
        return Ok(FileOutcome::Duplicate(existing.id));
    }

    let doc_id = Uuid::new_v4();
    let storage_key = BlobStore::document_key(case.uuid, doc_id, &extension);
    store.put(&storage_key, bytes)?;

    let doc = Document {
        id: doc_id,
        case_id: case.uuid,
        storage_key,
        original_filename: filename.to_string(),
        content_hash: hash,
        size_bytes: bytes.len() as u64,
        extension,
        doc_type: None,
        classification_confidence: None,
        classification_method: None,
        ocr_text: None,
        page_count: None,
        status: DocumentStatus::Uploaded,
        failure_reason: None,
        created_at: now,
        updated_at: now,
    };

    // Row and OCR job commit together; a crash between blob write and commit
    // leaves only an unreferenced blob behind
    let inserted = db.with_tx(|tx| {
        match documents::insert(tx, &doc) {
            Ok(()) => {
                jobs::enqueue(
                    tx,
                    JobKind::Ocr,
                    case.uuid,
                    serde_json::json!({ "document_id": doc.id }),
                    now,
                )?;
                Ok(None)
            }
            Err(CaseError::Duplicate { existing_id, .. }) => Ok(Some(existing_id)),
            Err(e) => Err(e),
        }
    })?;
    match inserted {
        None => Ok(FileOutcome::Created(doc_id)),
        Some(existing_id) => Ok(FileOutcome::Duplicate(
            existing_id.parse().unwrap_or_default(),
        )),
    }
}

/// Expand zip archives (recursively) and pass plain files through
fn expand_all(items: Vec<(String, Vec<u8>)>, outcome: &mut IngestOutcome) -> Vec<(String, Vec<u8>)> {
    let mut leaves = Vec::new();
    for (filename, bytes) in items {
        if extension_of(&filename).as_deref() == Some("zip") {
            match expand_zip(&bytes) {
                Ok(entries) => leaves.extend(entries),
                Err(e) => {
                    warn!(filename, error = %e, "archive expansion failed");
                    outcome.rejected.push(RejectedDoc {
                        filename,
                        reason: format!("unreadable archive: {e}"),
                    });
                }
            }
        } else {
            leaves.push((filename, bytes));
        }
    }
    leaves
}

fn expand_zip(bytes: &[u8]) -> std::result::Result<Vec<(String, Vec<u8>)>, zip::result::ZipError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || entry.size() == 0 {
            continue;
        }
        let name = entry.name().to_string();
        if is_ignored_entry(&name) {
            continue;
        }
        let leaf = name.rsplit('/').next().unwrap_or(&name).to_string();
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        if extension_of(&leaf).as_deref() == Some("zip") {
            // Nested archives flatten too
            out.extend(expand_zip(&content)?);
        } else {
            out.push((leaf, content));
        }
    }
    Ok(out)
}

fn is_ignored_entry(name: &str) -> bool {
    if name.starts_with("__MACOSX/") || name.contains("/__MACOSX/") {
        return true;
    }
    let leaf = name.rsplit('/').next().unwrap_or(name);
    IGNORED_NAMES.contains(&leaf) || leaf.starts_with("._")
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}
