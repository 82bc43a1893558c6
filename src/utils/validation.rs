use anyhow::{Result, anyhow};
use std::path::Path;

/// Extension accepted by the conversion endpoint (compared case-insensitively)
pub const PDF_EXTENSION: &str = "pdf";

/// Extension of the produced document
pub const DOCX_EXTENSION: &str = "docx";

/// Longest name kept after sanitizing, in bytes
pub const MAX_FILENAME_BYTES: usize = 255;

/// Download name used when the upload has no usable stem
pub const FALLBACK_STEM: &str = "converted";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Reduces a client supplied filename to its final component and strips
/// characters that are unsafe in headers or on common filesystems.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Browsers on Windows may send the full client path
    let last = filename.rsplit(['/', '\\']).next().unwrap_or("");

    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::debug!("Stripped directory components from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    Ok(truncate_keeping_extension(&sanitized, MAX_FILENAME_BYTES))
}

/// Shortens the stem so the whole name fits in `max` bytes. The extension
/// is kept as is and the cut always lands on a char boundary.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx < max => name.split_at(idx),
        _ => (name, ""),
    };

    let mut end = max - ext.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], ext)
}

/// True when the name ends in `.pdf`, ignoring case
pub fn has_pdf_extension(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(&format!(".{}", PDF_EXTENSION))
}

/// Validates an upload name before any I/O takes place.
///
/// Returns the sanitized name on success.
pub fn validate_pdf_filename(filename: &str) -> Result<String> {
    if !has_pdf_extension(filename) {
        return Err(anyhow!(ValidationError {
            code: "UNSUPPORTED_FILE_TYPE",
            message: "Only PDF files are supported".to_string(),
        }));
    }
    sanitize_filename(filename)
}

/// Derives the download name by swapping the final extension for `.docx`
pub fn docx_filename(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    };
    let stem = if stem.trim().is_empty() {
        FALLBACK_STEM
    } else {
        stem
    };
    format!("{}.{}", stem, DOCX_EXTENSION)
}
