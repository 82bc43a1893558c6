use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use utoipa::ToSchema;

use crate::config::ServerConfig;

/// Zero-based page window passed to the converter.
///
/// `end` is exclusive; `None` means "through the last page".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl PageRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: usize, end: Option<usize>) -> Result<Self> {
        if let Some(end) = end {
            if end <= start {
                bail!("Page range end ({}) must be greater than start ({})", end, start);
            }
        }
        Ok(Self { start, end })
    }

    /// True when the range covers the whole document
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }
}

/// A PDF to DOCX conversion backend.
///
/// Backends hand out a [`ConversionSession`] per input file. Callers must
/// `close` every session they open, including when `convert` fails.
#[async_trait::async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Short backend identifier used in logs and health output
    fn name(&self) -> &'static str;

    /// Whether `convert` honours a partial [`PageRange`]
    fn supports_page_range(&self) -> bool {
        false
    }

    /// Acquire converter resources for one input document
    async fn open(&self, input: &Path) -> Result<Box<dyn ConversionSession>>;

    /// Check if the backend is installed and runnable
    async fn health_check(&self) -> bool;
}

/// Converter state bound to one input document
#[async_trait::async_trait]
pub trait ConversionSession: Send {
    /// Write the converted document to `output`
    async fn convert(&mut self, output: &Path, pages: PageRange) -> Result<()>;

    /// Release everything acquired by `open`. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Run a converter process to completion, capturing stderr for the error
/// message. The child is killed if the returned future is dropped first.
async fn run_process(label: &str, mut command: Command) -> Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| anyhow!("Failed to start {}: {}", label, e))?;
    let mut stderr = child.stderr.take();

    // Drain stderr while waiting so a chatty converter cannot fill the pipe
    let (status, stderr_out) = tokio::join!(child.wait(), async {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = status.map_err(|e| anyhow!("Failed to wait for {}: {}", label, e))?;
    check_status(label, status, &stderr_out)
}

fn check_status(label: &str, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let err_msg = String::from_utf8_lossy(stderr);
    let err_msg = err_msg.trim();
    tracing::error!("{} failed ({}): {}", label, status, err_msg);
    Err(anyhow!("{} failed ({}): {}", label, status, err_msg))
}

async fn probe(bin: &str, arg: &str) -> bool {
    Command::new(bin)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

async fn ensure_readable(input: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(input)
        .await
        .map_err(|e| anyhow!("Cannot open {}: {}", input.display(), e))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", input.display());
    }
    Ok(())
}

/// Converter driving the `pdf2docx` command line tool
///
/// ```bash
/// pip install pdf2docx
/// ```
pub struct Pdf2DocxConverter {
    bin: String,
}

impl Pdf2DocxConverter {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn command_args(input: &Path, output: &Path, pages: PageRange) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "convert".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
            format!("--start={}", pages.start).into(),
        ];
        if let Some(end) = pages.end {
            args.push(format!("--end={}", end).into());
        }
        args
    }
}

#[async_trait::async_trait]
impl DocumentConverter for Pdf2DocxConverter {
    fn name(&self) -> &'static str {
        "pdf2docx"
    }

    fn supports_page_range(&self) -> bool {
        true
    }

    async fn open(&self, input: &Path) -> Result<Box<dyn ConversionSession>> {
        ensure_readable(input).await?;
        Ok(Box::new(Pdf2DocxSession {
            bin: self.bin.clone(),
            input: input.to_path_buf(),
        }))
    }

    async fn health_check(&self) -> bool {
        probe(&self.bin, "--help").await
    }
}

struct Pdf2DocxSession {
    bin: String,
    input: PathBuf,
}

#[async_trait::async_trait]
impl ConversionSession for Pdf2DocxSession {
    async fn convert(&mut self, output: &Path, pages: PageRange) -> Result<()> {
        let mut command = Command::new(&self.bin);
        command.args(Pdf2DocxConverter::command_args(&self.input, output, pages));
        tracing::debug!("Running {:?}", command);
        run_process("pdf2docx", command).await
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Converter driving a headless LibreOffice through its PDF import filter
pub struct LibreOfficeConverter {
    bin: String,
}

impl LibreOfficeConverter {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn command_args(input: &Path, outdir: &Path, profile: &Path) -> Vec<OsString> {
        vec![
            format!("-env:UserInstallation=file://{}", profile.display()).into(),
            "--headless".into(),
            "--norestore".into(),
            "--infilter=writer_pdf_import".into(),
            "--convert-to".into(),
            "docx:MS Word 2007 XML".into(),
            "--outdir".into(),
            outdir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ]
    }
}

#[async_trait::async_trait]
impl DocumentConverter for LibreOfficeConverter {
    fn name(&self) -> &'static str {
        "libreoffice"
    }

    async fn open(&self, input: &Path) -> Result<Box<dyn ConversionSession>> {
        ensure_readable(input).await?;
        // A private profile lets concurrent soffice instances run side by side
        let profile = tempfile::Builder::new().prefix("lo-profile-").tempdir()?;
        Ok(Box::new(LibreOfficeSession {
            bin: self.bin.clone(),
            input: input.to_path_buf(),
            profile: Some(profile),
        }))
    }

    async fn health_check(&self) -> bool {
        probe(&self.bin, "--version").await
    }
}

struct LibreOfficeSession {
    bin: String,
    input: PathBuf,
    profile: Option<TempDir>,
}

#[async_trait::async_trait]
impl ConversionSession for LibreOfficeSession {
    async fn convert(&mut self, output: &Path, pages: PageRange) -> Result<()> {
        if !pages.is_full() {
            bail!("libreoffice backend cannot convert a page range");
        }
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| anyhow!("LibreOffice session already closed"))?;
        let outdir = output
            .parent()
            .ok_or_else(|| anyhow!("Output path {} has no parent", output.display()))?;

        let mut command = Command::new(&self.bin);
        command.args(LibreOfficeConverter::command_args(
            &self.input,
            outdir,
            profile.path(),
        ));
        tracing::debug!("Running {:?}", command);
        run_process("soffice", command).await?;

        // soffice names its output after the input stem
        let stem = self
            .input
            .file_stem()
            .ok_or_else(|| anyhow!("Input path {} has no stem", self.input.display()))?;
        let produced = outdir.join(stem).with_extension("docx");
        if produced != output && tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            tokio::fs::rename(&produced, output).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(profile) = self.profile.take() {
            let path = profile.path().to_path_buf();
            profile
                .close()
                .map_err(|e| anyhow!("Failed to remove LibreOffice profile {}: {}", path.display(), e))?;
        }
        Ok(())
    }
}

/// Factory function to create the configured converter backend
pub fn create_converter(config: &ServerConfig) -> Box<dyn DocumentConverter> {
    match config.converter_backend.to_lowercase().as_str() {
        "pdf2docx" => Box::new(Pdf2DocxConverter::new(config.pdf2docx_bin.clone())),
        "libreoffice" | "soffice" => Box::new(LibreOfficeConverter::new(config.soffice_bin.clone())),
        other => {
            tracing::warn!("Unknown converter backend '{}', using pdf2docx", other);
            Box::new(Pdf2DocxConverter::new(config.pdf2docx_bin.clone()))
        }
    }
}
