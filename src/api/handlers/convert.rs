use crate::AppState;
use crate::api::error::AppError;
use crate::services::conversion_service::{ConvertedDocument, StagedUpload};
use crate::services::converter::PageRange;
use crate::utils::validation::{ValidationError, validate_pdf_filename};
use axum::{
    body::Body,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;
use validator::Validate;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Multipart form accepted by `POST /convert`
#[derive(ToSchema)]
pub struct ConvertForm {
    /// PDF document to convert; the filename must end in `.pdf`
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Zero-based index of the first page to convert (default 0)
    pub start: Option<usize>,
    /// Zero-based exclusive end page (default: last page)
    pub end: Option<usize>,
}

/// Page window collected from the optional form fields
#[derive(Debug, Default, Validate)]
#[validate(schema(function = "validate_page_window"))]
pub struct ConvertOptions {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

fn validate_page_window(options: &ConvertOptions) -> Result<(), validator::ValidationError> {
    if let Some(end) = options.end {
        if end <= options.start.unwrap_or(0) {
            let mut err = validator::ValidationError::new("page_range");
            err.message = Some("'end' must be greater than 'start'".into());
            return Err(err);
        }
    }
    Ok(())
}

impl ConvertOptions {
    pub fn page_range(&self) -> Result<PageRange, AppError> {
        self.validate()
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        PageRange::new(self.start.unwrap_or(0), self.end)
            .map_err(|e| AppError::InvalidInput(e.to_string()))
    }
}

fn parse_page_field(name: &str, text: &str) -> Result<Option<usize>, AppError> {
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }
    text.parse().map(Some).map_err(|_| {
        AppError::InvalidInput(format!("'{}' must be a non-negative page index", name))
    })
}

fn map_multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::InvalidInput(e.body_text())
    }
}

fn validation_message(e: &anyhow::Error) -> String {
    e.downcast_ref::<ValidationError>()
        .map(|v| v.message.clone())
        .unwrap_or_else(|| e.to_string())
}

/// Content-Type and Content-Disposition for the produced document
pub(crate) fn resolve_download_headers(filename: &str) -> (&'static str, String) {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.trim_end_matches(".docx").is_empty() {
        "converted.docx"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let content_disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    );

    (DOCX_CONTENT_TYPE, content_disposition)
}

fn download_response(document: ConvertedDocument) -> Result<Response, AppError> {
    let (content_type, content_disposition) = resolve_download_headers(&document.filename);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, document.content.len())
        .body(Body::from(document.content))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

#[utoipa::path(
    post,
    path = "/convert",
    request_body(content = ConvertForm, content_type = "multipart/form-data", description = "PDF upload"),
    responses(
        (status = 200, description = "Converted Word document (.docx attachment)"),
        (status = 400, description = "Not a PDF, missing file, or invalid page range"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "convert"
)]
pub async fn convert_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut options = ConvertOptions::default();
    let mut staged: Option<StagedUpload> = None;

    let result: Result<Response, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "file" => {
                    if staged.is_some() {
                        return Err(AppError::InvalidInput(
                            "Only one file can be converted per request".to_string(),
                        ));
                    }

                    // Checked before anything touches the filesystem
                    let original_filename = field.file_name().unwrap_or_default().to_string();
                    let filename = validate_pdf_filename(&original_filename)
                        .map_err(|e| AppError::InvalidInput(validation_message(&e)))?;

                    let body_with_io_error = field.map_err(std::io::Error::other);
                    let reader = StreamReader::new(body_with_io_error);

                    staged = Some(state.conversion_service.stage(&filename, reader).await?);
                }
                "start" | "end" => {
                    let text = field.text().await.map_err(map_multipart_error)?;
                    let value = parse_page_field(&name, &text)?;
                    if name == "start" {
                        options.start = value;
                    } else {
                        options.end = value;
                    }
                }
                other => tracing::debug!("Ignoring multipart field '{}'", other),
            }
        }

        let staged = staged
            .take()
            .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

        let pages = options.page_range()?;
        state.conversion_service.check_page_range(pages)?;

        let document = state.conversion_service.convert(staged, pages).await?;
        download_response(document)
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Drop any staged upload first so its workspace is gone even if draining stalls
            drop(staged.take());
            // Consume the rest of the body so the client sees our error instead of a reset
            tracing::warn!("Conversion request failed: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
