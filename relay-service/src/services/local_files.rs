//! Read-only access to the local scratch directory.
//!
//! Names are served only when they resolve to a regular file inside the
//! directory; anything that could walk out of it is rejected.

use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct LocalFiles {
    base_path: PathBuf,
}

impl LocalFiles {
    /// Open `base_path`, creating it if missing.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        let base_path = fs::canonicalize(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub async fn read(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(filename).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::not_found("file not found")),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve(&self, filename: &str) -> Result<PathBuf, AppError> {
        if !is_plain_file_name(filename) {
            tracing::warn!(filename = %filename, "Rejected local file name");
            return Err(AppError::bad_request("invalid file name"));
        }

        let canonical = match fs::canonicalize(self.base_path.join(filename)).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::not_found("file not found"))
            }
            Err(e) => return Err(e.into()),
        };

        // Symlinks may still point outside the directory.
        if !canonical.starts_with(&self.base_path) {
            tracing::warn!(filename = %filename, "Local file resolves outside scratch directory");
            return Err(AppError::bad_request("invalid file name"));
        }

        if !fs::metadata(&canonical).await?.is_file() {
            return Err(AppError::not_found("file not found"));
        }

        Ok(canonical)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
