//! End-to-end ingestion through the processor and an in-memory store

mod common;

use common::*;
use mindpub_ingestion::model::{PageCountSource, SourceFormat, UNKNOWN_AUTHOR};
use mindpub_ingestion::pdf::backend::PrimaryParse;
use mindpub_ingestion::pdf::partition::placeholder;
use mindpub_ingestion::pdf::PdfExtractor;
use mindpub_ingestion::IngestRequest;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const METADATA: &str = r#"<dc:title>The Long Walk</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <dc:subject>Fiction</dc:subject>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>"#;

#[tokio::test]
async fn test_epub_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "walk.epub", &sample_epub(METADATA));
    let (processor, store) = processor(&tmp.path().join("covers"), None);

    let outcome = processor.ingest(IngestRequest::new(&path)).await.unwrap();
    assert_eq!(outcome.format, SourceFormat::Epub);
    assert_eq!(outcome.title, "The Long Walk");
    assert_eq!(outcome.author, "A. Writer");
    assert_eq!(outcome.total_pages, 3);
    assert_eq!(outcome.attempts, 1);

    let stored = store.get(outcome.document_id).await.unwrap();
    assert_eq!(stored.document.page_count, 3);
    assert_eq!(stored.document.subject.as_deref(), Some("Fiction"));
    assert_eq!(stored.document.language.as_deref(), Some("en"));

    let numbers: Vec<i32> = stored.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    let chapters: Vec<Option<i32>> = stored.pages.iter().map(|p| p.chapter_number).collect();
    assert_eq!(chapters, vec![Some(1), Some(1), Some(2)]);
    assert!(stored.pages[0].content.starts_with("[CHAPTER: Arrival]\n\n"));
    assert!(stored.pages[1].content.starts_with("[CHAPTER: Arrival]\n\n"));
    assert!(stored.pages[2].content.starts_with("[CHAPTER: Departure]\n\n"));
    assert_eq!(stored.pages[2].chapter_title.as_deref(), Some("Departure"));
}

#[tokio::test]
async fn test_epub_pagination_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "walk.epub", &sample_epub(METADATA));
    let (processor, _store) = processor(&tmp.path().join("covers"), None);

    let first = processor
        .dispatcher()
        .parse_file(&path, "epub")
        .await
        .unwrap();
    let second = processor
        .dispatcher()
        .parse_file(&path, "epub")
        .await
        .unwrap();

    assert_eq!(first.pages, second.pages);
    assert_eq!(first.total_pages, second.total_pages);
}

#[tokio::test]
async fn test_epub_metadata_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(
        tmp.path(),
        "anon.epub",
        &sample_epub("<dc:title>Anonymous Work</dc:title>"),
    );
    let (processor, _store) = processor(&tmp.path().join("covers"), None);

    let outcome = processor.ingest(IngestRequest::new(&path)).await.unwrap();
    assert_eq!(outcome.title, "Anonymous Work");
    assert_eq!(outcome.author, UNKNOWN_AUTHOR);
}

#[tokio::test]
async fn test_epub_cover_saved() {
    let tmp = tempfile::tempdir().unwrap();
    let covers = tmp.path().join("covers");
    let path = write_file(tmp.path(), "walk.epub", &sample_epub(METADATA));
    let (processor, store) = processor(&covers, None);

    let outcome = processor.ingest(IngestRequest::new(&path)).await.unwrap();
    let cover_path = outcome.cover_path.unwrap();
    assert!(cover_path.starts_with(&covers));
    assert_eq!(cover_path.extension().unwrap(), "png");
    assert_eq!(std::fs::read(&cover_path).unwrap(), b"png-cover-bytes");

    let stored = store.get(outcome.document_id).await.unwrap();
    assert_eq!(
        stored.document.cover_path.as_deref(),
        Some(cover_path.display().to_string().as_str())
    );
}

#[tokio::test]
async fn test_pdf_page_count_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "scan.pdf", &pdf_with_pages(10));
    let (backend, calls) = CountingBackend::new(PrimaryParse::default());
    let (processor, store) = processor(&tmp.path().join("covers"), Some(Arc::new(backend)));

    let outcome = processor.ingest(IngestRequest::new(&path)).await.unwrap();
    assert_eq!(outcome.format, SourceFormat::Pdf);
    assert_eq!(outcome.total_pages, 10);
    assert_eq!(outcome.page_count_source, Some(PageCountSource::PageTree));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stored = store.get(outcome.document_id).await.unwrap();
    assert_eq!(stored.pages.len(), 10);
    assert_eq!(stored.pages[9].page_number, 10);
    assert_eq!(stored.pages[9].content, placeholder(10));
}

#[tokio::test]
async fn test_pdf_text_partitioned_contiguously() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "opaque.pdf", b"opaque bytes, no structure here");
    let text = "x".repeat(4000);
    let (backend, _calls) = CountingBackend::new(PrimaryParse {
        text: text.clone(),
        ..PrimaryParse::default()
    });
    let (processor, store) = processor(&tmp.path().join("covers"), Some(Arc::new(backend)));

    let outcome = processor
        .ingest(IngestRequest {
            declared_type: Some("pdf".into()),
            ..IngestRequest::new(&path)
        })
        .await
        .unwrap();
    assert_eq!(outcome.total_pages, 2);
    assert_eq!(outcome.page_count_source, Some(PageCountSource::TextEstimate));

    let stored = store.get(outcome.document_id).await.unwrap();
    assert_eq!(stored.pages[0].content.len(), 2000);
    let joined: String = stored.pages.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(joined, text);
}

#[tokio::test]
async fn test_pdf_pagination_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "essay.pdf", &pdf_with_pages(3));
    let text = format!("{}\n\n{}", words(400), words(300));
    let (backend, calls) = CountingBackend::new(PrimaryParse {
        text,
        ..PrimaryParse::default()
    });
    let (processor, _store) = processor(&tmp.path().join("covers"), Some(Arc::new(backend)));

    let first = processor
        .dispatcher()
        .parse_file(&path, "pdf")
        .await
        .unwrap();
    let second = processor
        .dispatcher()
        .parse_file(&path, "pdf")
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.total_pages, second.total_pages);
}

#[tokio::test]
async fn test_slow_pdf_parse_times_out_and_is_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "huge.pdf", &pdf_with_pages(2));
    let (backend, calls) = CountingBackend::new(PrimaryParse::default());
    let backend = backend.with_delay(Duration::from_millis(200));
    let pdf = PdfExtractor::new(&config(tmp.path()).ingestion)
        .with_renderer(None)
        .with_backend(Arc::new(backend))
        .with_timeout(Duration::from_millis(10));
    let (processor, store) = processor_with(&tmp.path().join("covers"), pdf);

    let err = processor
        .ingest(IngestRequest::new(&path))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "parse_timeout");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_undetermined_page_count_retried_then_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "broken.pdf", b"garbage");
    let (backend, calls) = CountingBackend::new(PrimaryParse::default());
    let (processor, store) = processor(&tmp.path().join("covers"), Some(Arc::new(backend)));

    let err = processor
        .ingest(IngestRequest::new(&path))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "undetermined_page_count");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unsupported_format_not_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "notes.txt", b"plain text");
    let (backend, calls) = CountingBackend::new(PrimaryParse::default());
    let (processor, store) = processor(&tmp.path().join("covers"), Some(Arc::new(backend)));

    let err = processor
        .ingest(IngestRequest::new(&path))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_format");
    assert!(!err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_reingest_replaces_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let original = write_file(tmp.path(), "walk.epub", &sample_epub(METADATA));
    let (processor, store) = processor(&tmp.path().join("covers"), None);

    let first = processor.ingest(IngestRequest::new(&original)).await.unwrap();
    assert_eq!(first.total_pages, 3);

    let revised = build_epub(&[
        ("META-INF/container.xml", CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf", opf(METADATA).into_bytes()),
        ("OEBPS/text/ch01.xhtml", chapter(1, "Arrival", 47).into_bytes()),
    ]);
    let revised = write_file(tmp.path(), "walk-v2.epub", &revised);

    let second = processor
        .reingest(first.document_id, IngestRequest::new(&revised))
        .await
        .unwrap();
    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.total_pages, 1);

    let stored = store.get(first.document_id).await.unwrap();
    assert_eq!(stored.document.page_count, 1);
    assert_eq!(stored.pages.len(), 1);
    assert!(stored.pages[0].content.starts_with("[CHAPTER: Arrival]\n\n"));
    assert_eq!(store.len().await, 1);
}
