use std::env;
use std::path::PathBuf;

/// Runtime configuration for the conversion service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum upload size in bytes (default: 100 MB)
    pub max_file_size: usize,

    /// Allowed CORS origins (comma separated, `*` allows any origin)
    pub allowed_origins: Vec<String>,

    /// Root under which per-request scratch workspaces are created
    pub scratch_dir: PathBuf,

    /// Converter backend: "pdf2docx" or "libreoffice" (default: "pdf2docx")
    pub converter_backend: String,

    /// Path or name of the pdf2docx executable
    pub pdf2docx_bin: String,

    /// Path or name of the LibreOffice executable
    pub soffice_bin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MB
            allowed_origins: vec![
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:5173".to_string(),
            ],
            scratch_dir: env::temp_dir(),
            converter_backend: "pdf2docx".to_string(),
            pdf2docx_bin: "pdf2docx".to_string(),
            soffice_bin: "soffice".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| parse_origins(&v))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(default.allowed_origins),

            scratch_dir: env::var("SCRATCH_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            converter_backend: env::var("CONVERTER_BACKEND")
                .unwrap_or(default.converter_backend),

            pdf2docx_bin: env::var("PDF2DOCX_BIN").unwrap_or(default.pdf2docx_bin),

            soffice_bin: env::var("SOFFICE_BIN").unwrap_or(default.soffice_bin),
        }
    }

    /// Create config for local development (any origin may call the API)
    pub fn development() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            ..Self::default()
        }
    }

    /// True when the allow-list contains the `*` wildcard
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
