use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of every request-scoped scratch directory
pub const WORKSPACE_PREFIX: &str = "pdf2docx-";

const INPUT_NAME: &str = "input.pdf";
const OUTPUT_NAME: &str = "output.docx";

/// Request-scoped directory holding the uploaded PDF and the converter output.
///
/// The directory is removed when the workspace is closed or dropped. Removal
/// is best-effort: failures are logged and never returned to the caller.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    input: PathBuf,
    output: PathBuf,
}

impl ScratchWorkspace {
    /// Allocate a fresh, uniquely named directory under `root`
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        tracing::debug!("Created scratch workspace {}", path.display());

        Ok(Self {
            input: path.join(INPUT_NAME),
            output: path.join(OUTPUT_NAME),
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Remove the directory now rather than at end of scope
    pub fn close(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::debug!("Removed scratch workspace {}", self.path.display()),
                Err(e) => tracing::warn!(
                    "Failed to remove scratch workspace {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}
