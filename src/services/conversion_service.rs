use anyhow::Result;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::api::error::AppError;
use crate::config::ServerConfig;
use crate::services::converter::{DocumentConverter, PageRange};
use crate::services::workspace::ScratchWorkspace;
use crate::utils::validation::docx_filename;

/// An upload written to its own scratch workspace, waiting for conversion.
///
/// Dropping it removes the workspace.
#[derive(Debug)]
pub struct StagedUpload {
    filename: String,
    size: u64,
    workspace: ScratchWorkspace,
}

impl StagedUpload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }
}

/// The produced document, held in memory so the workspace can be removed
/// before the response is sent.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub filename: String,
    pub content: Bytes,
}

pub struct ConversionService {
    converter: Arc<dyn DocumentConverter>,
    scratch_dir: PathBuf,
    max_file_size: u64,
}

impl ConversionService {
    pub fn new(converter: Arc<dyn DocumentConverter>, config: &ServerConfig) -> Self {
        Self {
            converter,
            scratch_dir: config.scratch_dir.clone(),
            max_file_size: config.max_file_size as u64,
        }
    }

    pub fn converter(&self) -> &Arc<dyn DocumentConverter> {
        &self.converter
    }

    /// Rejects page ranges the configured backend cannot honour
    pub fn check_page_range(&self, pages: PageRange) -> Result<(), AppError> {
        if !pages.is_full() && !self.converter.supports_page_range() {
            return Err(AppError::InvalidInput(format!(
                "The {} converter does not support page ranges",
                self.converter.name()
            )));
        }
        Ok(())
    }

    /// Stream an already validated upload into a fresh scratch workspace.
    ///
    /// Uploads larger than `max_file_size` are rejected and their workspace
    /// removed.
    pub async fn stage<R>(&self, filename: &str, reader: R) -> Result<StagedUpload, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let workspace = ScratchWorkspace::create(&self.scratch_dir)?;

        let size = {
            let mut file = tokio::fs::File::create(workspace.input_path()).await?;
            // One byte past the limit is enough to tell an oversized upload
            let mut limited = reader.take(self.max_file_size + 1);
            let size = tokio::io::copy(&mut limited, &mut file)
                .await
                .map_err(map_upload_error)?;
            file.flush().await?;
            size
        };

        if size > self.max_file_size {
            warn!(
                "Rejected {}: exceeds the {} byte upload limit",
                filename, self.max_file_size
            );
            return Err(AppError::PayloadTooLarge(format!(
                "File too large. Max: {} bytes",
                self.max_file_size
            )));
        }
        debug!("Staged {} ({} bytes) in {}", filename, size, workspace.path().display());

        Ok(StagedUpload {
            filename: filename.to_string(),
            size,
            workspace,
        })
    }

    /// Convert a staged upload. The workspace is removed on every exit path.
    pub async fn convert(
        &self,
        staged: StagedUpload,
        pages: PageRange,
    ) -> Result<ConvertedDocument, AppError> {
        let StagedUpload {
            filename,
            size,
            workspace,
        } = staged;

        info!(
            "Converting {} ({} bytes) with {} [pages {:?}]",
            filename,
            size,
            self.converter.name(),
            pages
        );

        let result = self
            .convert_in(workspace.input_path(), workspace.output_path(), pages)
            .await;
        workspace.close();

        let content = result?;
        let filename = docx_filename(&filename);
        info!("Converted to {} ({} bytes)", filename, content.len());

        Ok(ConvertedDocument { filename, content })
    }

    async fn convert_in(
        &self,
        input: &Path,
        output: &Path,
        pages: PageRange,
    ) -> Result<Bytes, AppError> {
        self.run_session(input, output, pages).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(AppError::ConversionFailure(format!(
                "{} finished without producing {}",
                self.converter.name(),
                output.display()
            )));
        }

        let content = tokio::fs::read(output).await?;
        // DOCX is an OOXML package, i.e. a ZIP container
        if !infer::archive::is_zip(&content) {
            return Err(AppError::ConversionFailure(format!(
                "{} produced {} bytes that are not a DOCX container",
                self.converter.name(),
                content.len()
            )));
        }

        Ok(Bytes::from(content))
    }

    /// Open a converter session, convert, and close the session whether or
    /// not the conversion succeeded. Close failures are logged only.
    pub async fn run_session(&self, input: &Path, output: &Path, pages: PageRange) -> Result<()> {
        let mut session = self.converter.open(input).await?;
        let result = session.convert(output, pages).await;
        if let Err(e) = session.close().await {
            warn!("Failed to release {} session: {}", self.converter.name(), e);
        }
        result
    }
}

fn map_upload_error(e: std::io::Error) -> AppError {
    let over_limit = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
        .is_some_and(|m| m.status() == StatusCode::PAYLOAD_TOO_LARGE);

    if over_limit {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::Io(e)
    }
}
