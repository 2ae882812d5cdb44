//! Document ingestion: bytes → page texts → overlapping chunks.
//!
//! Each document in a batch is handled independently. A document that
//! cannot be extracted contributes zero chunks and an entry in
//! [`IngestReport::errors`]; the rest of the batch carries on.

use std::path::Path;

use anyhow::{Context, Result};
use docchat_core::chunk::{chunk_pages, ChunkingParams};
use docchat_core::models::Chunk;
use serde::Serialize;
use tracing::{info, warn};

use crate::extract::{detect_content_type, extract_pages};
use crate::progress::{IngestProgressEvent, ProgressReporter};

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Display name, usually the file name. Stored as chunk `source`.
    pub name: String,
    /// Declared MIME type, if the uploader supplied one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    /// Read a document from disk, naming it after the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            content_type: None,
            bytes,
        })
    }
}

/// Per-document outcome summary.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub content_type: String,
    pub pages: usize,
    pub chunks: usize,
}

/// A document that was skipped, and why.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionFailure {
    pub document: String,
    pub reason: String,
}

/// Result of ingesting a batch.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Chunks from every successfully extracted document, in batch order.
    pub chunks: Vec<Chunk>,
    pub documents: Vec<DocumentSummary>,
    pub errors: Vec<IngestionFailure>,
}

/// Extract and chunk every document in `docs`.
pub fn ingest_documents(
    docs: &[UploadedDocument],
    params: &ChunkingParams,
    progress: &dyn ProgressReporter,
) -> IngestReport {
    let mut report = IngestReport::default();
    let total = docs.len() as u64;

    for (i, doc) in docs.iter().enumerate() {
        progress.report(IngestProgressEvent::Extracting {
            document: doc.name.clone(),
            n: i as u64 + 1,
            total,
        });

        let content_type = detect_content_type(&doc.name, doc.content_type.as_deref(), &doc.bytes);
        let pages = match extract_pages(&doc.bytes, &content_type) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(document = %doc.name, error = %e, "skipping document");
                report.errors.push(IngestionFailure {
                    document: doc.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let chunks = chunk_pages(&doc.name, &pages, params);
        info!(
            document = %doc.name,
            pages = pages.len(),
            chunks = chunks.len(),
            "ingested document"
        );
        report.documents.push(DocumentSummary {
            name: doc.name.clone(),
            content_type,
            pages: pages.len(),
            chunks: chunks.len(),
        });
        report.chunks.extend(chunks);
    }

    report
}
