//! OCR engine
//!
//! Deterministic text extraction from uploaded blobs. PDFs go through the
//! text layer (`pdf-extract`) with the page count read via `lopdf`. Image
//! formats carry no text layer, so they complete with empty text and the
//! classifier falls back to filename heuristics.

use lendcase_core::error::{CaseError, Result};
use tracing::debug;

/// OCR output for one document
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub page_count: u32,
}

/// Failure reason codes persisted on the document
pub const REASON_PASSWORD_PROTECTED: &str = "password_protected";
pub const REASON_CORRUPT_FILE: &str = "corrupt_file";

/// Extract text from an uploaded blob.
///
/// Deterministic given the same bytes. Errors carry a stable reason code in
/// the message and are not retryable.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<OcrOutput> {
    match extension {
        "pdf" => extract_pdf(bytes),
        // jpg/png/tif uploads have no embedded text layer
        _ => Ok(OcrOutput { text: String::new(), page_count: 1 }),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<OcrOutput> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| CaseError::validation(format!("{REASON_CORRUPT_FILE}: {e}")))?;
    if doc.is_encrypted() {
        return Err(CaseError::validation(REASON_PASSWORD_PROTECTED.to_string()));
    }
    let page_count = doc.get_pages().len() as u32;

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| CaseError::validation(format!("{REASON_CORRUPT_FILE}: {e}")))?;
    debug!(page_count, chars = text.len(), "pdf text extracted");
    Ok(OcrOutput { text: normalize(&text), page_count: page_count.max(1) })
}

/// Collapse the extractor's whitespace artifacts so downstream regexes see
/// stable text
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() && out.ends_with("\n\n") {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_complete_textless() {
        let out = extract_text(&[0xFF, 0xD8, 0xFF, 0xE0], "jpg").unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.page_count, 1);
    }

    #[test]
    fn test_garbage_pdf_is_corrupt() {
        let err = extract_text(b"not a pdf at all", "pdf").unwrap_err();
        assert!(err.to_string().contains(REASON_CORRUPT_FILE));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let text = "a   \n\n\n\nb";
        assert_eq!(normalize(text), "a\n\nb");
    }
}
