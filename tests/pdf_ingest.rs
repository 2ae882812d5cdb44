//! PDF uploads, from bytes on disk to an answer.

mod common;

use common::{harness, pdf_with_text};
use docchat::extract::{extract_pages, MIME_PDF};
use docchat::ingest::UploadedDocument;
use docchat::progress::NoProgress;
use docchat_core::models::MetadataValue;
use tempfile::TempDir;

#[test]
fn pdf_text_is_extracted_per_page() {
    let pages = extract_pages(&pdf_with_text("The capital of France is Paris."), MIME_PDF).unwrap();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains("Paris"), "page text: {:?}", pages[0]);
}

#[tokio::test]
async fn pdf_from_disk_answers_questions() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("atlas.pdf");
    std::fs::write(&path, pdf_with_text("The capital of France is Paris.")).unwrap();

    let h = harness();
    let doc = UploadedDocument::from_path(&path).unwrap();
    let report = h.app.upload(&[doc], &NoProgress).await.unwrap();
    assert_eq!(report.documents[0].content_type, MIME_PDF);
    assert_eq!(report.documents[0].pages, 1);
    assert!(report.index.chunks >= 1);

    let outcome = h
        .app
        .converse("reader", "What is the capital of France?")
        .await
        .unwrap();
    assert!(outcome.answer.contains("Paris"), "answer: {}", outcome.answer);
    let chunk = &outcome.sources[0].chunk;
    assert_eq!(chunk.source(), Some("atlas.pdf"));
    assert_eq!(chunk.meta("page"), Some(&MetadataValue::Int(1)));
}
