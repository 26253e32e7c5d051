//! Audit logging module
//!
//! Structured audit events for case lifecycle, pipeline stages and copilot
//! usage. Events are written to stdout via tracing and, when configured, to
//! JSON Lines files with daily rotation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Audit event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Server started
    ServerStarted { version: String, lender_products: usize },
    /// Case created
    CaseCreated { case_id: String, operator_id: String },
    /// Case soft-deleted
    CaseDeleted { case_id: String, operator_id: String, cancelled_jobs: usize },
    /// Upload batch ingested
    DocumentsIngested {
        case_id: String,
        created: usize,
        duplicates: usize,
        rejected: usize,
    },
    /// A pipeline stage finished for a case or document
    StageCompleted {
        case_id: String,
        stage: String,
        duration_ms: u64,
    },
    /// A pipeline stage failed terminally
    StageFailed {
        case_id: String,
        stage: String,
        reason: String,
    },
    /// An eligibility run was written
    EligibilityRun {
        case_id: String,
        run_id: String,
        evaluated: usize,
        passed: usize,
    },
    /// A report was rendered
    ReportGenerated { case_id: String, report_id: String },
    /// A copilot exchange completed
    CopilotQuery {
        operator_id: String,
        query_type: String,
        answered_by: String,
    },
}

/// Audit log entry with metadata
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: DateTime<Utc>,
    level: &'static str,
    #[serde(flatten)]
    event: AuditEvent,
}

/// File writer state for daily rotation
struct FileWriter {
    writer: BufWriter<File>,
    current_date: String,
}

/// Audit logger
pub struct AuditLogger {
    /// Audit log directory (None = stdout only)
    audit_dir: Option<PathBuf>,
    /// Current file writer (protected by mutex for file rotation)
    file_writer: Mutex<Option<FileWriter>>,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(audit_dir: Option<PathBuf>) -> Self {
        Self {
            audit_dir,
            file_writer: Mutex::new(None),
        }
    }

    /// Log an audit event
    pub fn log(&self, event: AuditEvent) {
        let entry = AuditLogEntry {
            timestamp: Utc::now(),
            level: "audit",
            event,
        };
        match serde_json::to_string(&entry) {
            Ok(line) => {
                info!(target: "audit", "{line}");
                self.write_to_file(&entry.timestamp, &line);
            }
            Err(e) => info!(target: "audit", "unserializable audit event: {e}"),
        }
    }

    fn write_to_file(&self, timestamp: &DateTime<Utc>, line: &str) {
        let Some(dir) = &self.audit_dir else {
            return;
        };
        let date = timestamp.format("%Y-%m-%d").to_string();
        let mut guard = match self.file_writer.lock() {
            Ok(g) => g,
            Err(_) => return,
        };

        let needs_rotation = guard.as_ref().map(|w| w.current_date != date).unwrap_or(true);
        if needs_rotation {
            if let Some(w) = guard.as_mut() {
                let _ = w.writer.flush();
            }
            if fs::create_dir_all(dir).is_err() {
                return;
            }
            let path = dir.join(format!("audit-{date}.jsonl"));
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    *guard = Some(FileWriter {
                        writer: BufWriter::new(file),
                        current_date: date,
                    });
                }
                Err(_) => return,
            }
        }

        if let Some(w) = guard.as_mut() {
            let _ = writeln!(w.writer, "{line}");
            let _ = w.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_written_to_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(Some(dir.path().to_path_buf()));
        logger.log(AuditEvent::CaseCreated {
            case_id: "CASE-20260101-0001".to_string(),
            operator_id: "op-1".to_string(),
        });
        logger.log(AuditEvent::StageCompleted {
            case_id: "CASE-20260101-0001".to_string(),
            stage: "ocr".to_string(),
            duration_ms: 42,
        });

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"event\":\"case_created\""));
    }

    #[test]
    fn test_stdout_only_without_dir() {
        let logger = AuditLogger::new(None);
        logger.log(AuditEvent::ServerStarted {
            version: "0.2.0".to_string(),
            lender_products: 0,
        });
    }
}
