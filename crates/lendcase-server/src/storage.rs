//! Content-addressed blob store
//!
//! Local filesystem layout mirrors the logical keys:
//! `cases/{case_uuid}/docs/{document_uuid}{ext}` and
//! `cases/{case_uuid}/reports/{report_id}.pdf`. Writes go through a temp file
//! and rename, so a key either resolves to a complete blob or nothing.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lendcase_core::error::{CaseError, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (and create) the store root
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| CaseError::internal(format!("blob store root: {e}")))?;
        Ok(Self { root })
    }

    /// Deterministic key for a document blob
    pub fn document_key(case_uuid: Uuid, document_uuid: Uuid, extension: &str) -> String {
        format!("cases/{case_uuid}/docs/{document_uuid}.{extension}")
    }

    /// Deterministic key for a rendered report
    pub fn report_key(case_uuid: Uuid, report_id: Uuid) -> String {
        format!("cases/{case_uuid}/reports/{report_id}.pdf")
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are internal, but never follow one that escapes the root
        if key.split('/').any(|seg| seg == "..") || Path::new(key).is_absolute() {
            return Err(CaseError::validation(format!("invalid blob key '{key}'")));
        }
        Ok(self.root.join(key))
    }

    /// Write a blob under its key. Content-addressed writes are idempotent:
    /// re-writing an existing key with the same bytes is a no-op.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaseError::internal(format!("blob dir {key}: {e}")))?;
        }
        if path.exists() {
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        let mut file =
            fs::File::create(&tmp).map_err(|e| CaseError::internal(format!("blob {key}: {e}")))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| CaseError::internal(format!("blob {key}: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| CaseError::internal(format!("blob {key}: {e}")))?;
        Ok(())
    }

    /// Read a blob
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CaseError::not_found("Blob", key),
            _ => CaseError::internal(format!("blob {key}: {e}")),
        })
    }

    /// Whether a key resolves to a stored blob
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.exists()).unwrap_or(false)
    }
}

/// SHA-256 of a byte stream, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    // Feed in chunks so the same code path serves streamed uploads
    for chunk in bytes.chunks(64 * 1024) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let key = BlobStore::document_key(Uuid::new_v4(), Uuid::new_v4(), "pdf");
        store.put(&key, b"hello").unwrap();
        assert_eq!(store.get(&key).unwrap(), b"hello");
        // Idempotent re-write
        store.put(&key, b"hello").unwrap();
        assert!(store.exists(&key));
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let err = store.get("cases/x/docs/y.pdf").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        assert!(store.put("../outside.bin", b"x").is_err());
    }

    #[test]
    fn test_content_hash_stable() {
        let h = content_hash(b"abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
