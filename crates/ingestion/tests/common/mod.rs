//! Fixtures shared by the pipeline tests

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object};
use mindpub_common::config::AppConfig;
use mindpub_ingestion::epub::EpubExtractor;
use mindpub_ingestion::pdf::backend::{PdfBackend, PrimaryParse};
use mindpub_ingestion::pdf::PdfExtractor;
use mindpub_ingestion::{Dispatcher, IngestionProcessor, MemoryStore, RetryPolicy};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

/// OPF package with the given `<metadata>` body and a PNG cover item
pub fn opf(metadata: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    {}
  </metadata>
  <manifest>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    <item id="ch1" href="text/ch01.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch02.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="ch1"/><itemref idref="ch2"/></spine>
</package>"#,
        metadata
    )
}

pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}

/// XHTML chapter whose heading adds three words to `body_words`
pub fn chapter(number: u32, title: &str, body_words: usize) -> String {
    format!(
        "<html><body><h1>CHAPTER {}. {}</h1>\n<p>{}</p></body></html>",
        number,
        title,
        words(body_words)
    )
}

pub fn build_epub(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Two chapters of 600 and 200 words with a cover image
pub fn sample_epub(metadata: &str) -> Vec<u8> {
    build_epub(&[
        ("META-INF/container.xml", CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf", opf(metadata).into_bytes()),
        ("OEBPS/text/ch01.xhtml", chapter(1, "Arrival", 597).into_bytes()),
        ("OEBPS/text/ch02.xhtml", chapter(2, "Departure", 197).into_bytes()),
        ("OEBPS/images/cover.png", b"png-cover-bytes".to_vec()),
    ])
}

/// Structurally valid PDF with `n` empty pages
pub fn pdf_with_pages(n: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..n)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => n as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// Primary parser returning a fixed result and counting its calls
pub struct CountingBackend {
    primary: PrimaryParse,
    calls: Arc<AtomicU32>,
    delay: Duration,
}

impl CountingBackend {
    pub fn new(primary: PrimaryParse) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                primary,
                calls: Arc::clone(&calls),
                delay: Duration::ZERO,
            },
            calls,
        )
    }

    /// Block for `delay` inside every parse
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl PdfBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn parse(&self, _data: &[u8]) -> Result<PrimaryParse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.primary.clone())
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

pub fn config(cover_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.cover_dir = cover_dir.to_path_buf();
    config.ingestion.render_pdf_covers = false;
    config
}

/// Processor over an in-memory store, optionally with a stubbed PDF parser
pub fn processor(
    cover_dir: &Path,
    backend: Option<Arc<dyn PdfBackend>>,
) -> (IngestionProcessor, Arc<MemoryStore>) {
    let mut pdf = PdfExtractor::new(&config(cover_dir).ingestion).with_renderer(None);
    if let Some(backend) = backend {
        pdf = pdf.with_backend(backend);
    }
    processor_with(cover_dir, pdf)
}

/// Processor over an in-memory store with a fully configured PDF extractor
pub fn processor_with(
    cover_dir: &Path,
    pdf: PdfExtractor,
) -> (IngestionProcessor, Arc<MemoryStore>) {
    let config = config(cover_dir);
    let dispatcher = Dispatcher::from_extractors(EpubExtractor::new(&config.ingestion), pdf);

    let store = Arc::new(MemoryStore::new());
    let processor = IngestionProcessor::new(&config, store.clone())
        .with_dispatcher(dispatcher)
        .with_retry_policy(fast_retry());
    (processor, store)
}
