//! Text extraction for uploaded documents.
//!
//! Turns raw bytes plus a content type into a list of page texts. PDFs are
//! extracted page by page with `pdf-extract`; plain text and Markdown are a
//! single page. Extraction never panics: failures come back as
//! [`ExtractError`] and the ingest pipeline skips the document.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Extraction error. The ingest pipeline records it and moves on.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    InvalidUtf8(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::InvalidUtf8(e) => write!(f, "text is not valid UTF-8: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract page texts from `bytes`. `pages[0]` is page 1.
pub fn extract_pages(bytes: &[u8], content_type: &str) -> Result<Vec<String>, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => extract_plain(bytes),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Resolve the content type of an upload.
///
/// An explicit, non-generic content type wins. Otherwise the file extension
/// of `name` decides, and finally the `%PDF-` magic bytes.
pub fn detect_content_type(name: &str, declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(ct) = declared {
        let ct = ct.split(';').next().unwrap_or(ct).trim();
        if !ct.is_empty() && ct != "application/octet-stream" {
            return ct.to_string();
        }
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => return MIME_PDF.to_string(),
        Some("txt") | Some("text") => return MIME_TEXT.to_string(),
        Some("md") | Some("markdown") => return MIME_MARKDOWN.to_string(),
        _ => {}
    }

    if bytes.starts_with(b"%PDF-") {
        MIME_PDF.to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    // pdf-extract panics on some malformed font tables.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

fn extract_plain(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::InvalidUtf8(e.to_string()))?;
    Ok(vec![text.to_string()])
}
