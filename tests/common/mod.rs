#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use pdf2docx_server::config::ServerConfig;
use pdf2docx_server::services::conversion_service::ConversionService;
use pdf2docx_server::services::converter::{ConversionSession, DocumentConverter, PageRange};
use pdf2docx_server::{AppState, create_app};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Hand-built multipart/form-data body
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, filename: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/convert")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Mode {
    /// Write a DOCX whose document.xml echoes the uploaded bytes
    EchoDocx,
    /// Return success without writing anything
    NoOutput,
    /// Fail mid-conversion after writing a partial file
    Crash,
}

/// Converter double that records how it was driven
pub struct MockConverter {
    mode: Mode,
    page_ranges: bool,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub pages_seen: Arc<Mutex<Vec<PageRange>>>,
}

impl MockConverter {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            page_ranges: true,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            pages_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_page_ranges(mut self) -> Self {
        self.page_ranges = false;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockSession {
    mode: Mode,
    input: std::path::PathBuf,
    closed: Arc<AtomicUsize>,
    pages_seen: Arc<Mutex<Vec<PageRange>>>,
}

#[async_trait]
impl DocumentConverter for MockConverter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports_page_range(&self) -> bool {
        self.page_ranges
    }

    async fn open(&self, input: &Path) -> anyhow::Result<Box<dyn ConversionSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            mode: self.mode,
            input: input.to_path_buf(),
            closed: self.closed.clone(),
            pages_seen: self.pages_seen.clone(),
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl ConversionSession for MockSession {
    async fn convert(&mut self, output: &Path, pages: PageRange) -> anyhow::Result<()> {
        self.pages_seen.lock().unwrap().push(pages);
        match self.mode {
            Mode::EchoDocx => {
                let input = tokio::fs::read(&self.input).await?;
                // Yield so concurrent requests interleave
                tokio::task::yield_now().await;
                write_docx(output, &String::from_utf8_lossy(&input))
            }
            Mode::NoOutput => Ok(()),
            Mode::Crash => {
                tokio::fs::write(output, b"PK partial").await?;
                anyhow::bail!("converter raised mid-conversion")
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn write_docx(path: &Path, text: &str) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
    )?;
    zip.start_file("word/document.xml", options)?;
    zip.write_all(
        format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
            text
        )
        .as_bytes(),
    )?;
    zip.finish()?;
    Ok(())
}

/// Reads `word/document.xml` out of a DOCX body
pub fn document_xml(docx: &[u8]) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(docx)).unwrap();
    let mut entry = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    xml
}

pub fn test_config(scratch: &Path) -> ServerConfig {
    ServerConfig {
        scratch_dir: scratch.to_path_buf(),
        ..ServerConfig::default()
    }
}

pub fn app_with(converter: Arc<dyn DocumentConverter>, config: ServerConfig) -> Router {
    let _ = tracing_subscriber::fmt::try_init();
    let conversion_service = Arc::new(ConversionService::new(converter, &config));
    create_app(AppState {
        conversion_service,
        config,
    })
}

pub async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub fn scratch_entries(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}
