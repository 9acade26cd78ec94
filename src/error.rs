//! Error types shared across the crate.
//!
//! Most of the crate returns `anyhow::Result`; these enums exist where callers
//! need to tell failure kinds apart.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reading or writing an XMP sidecar.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("no sidecar at {0}")]
    NotFound(PathBuf),

    #[error("sidecar I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed sidecar: {0}")]
    Parse(String),
}

impl From<quick_xml::Error> for SidecarError {
    fn from(err: quick_xml::Error) -> Self {
        SidecarError::Parse(err.to_string())
    }
}

/// Errors raised for bad invocation arguments.
#[derive(Debug, Error)]
pub enum WallsortError {
    #[error("path '{0}' does not exist")]
    PathNotFound(PathBuf),

    #[error("path '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("'{0}' is not a supported image format")]
    UnsupportedImage(PathBuf),
}

/// Fail with [`WallsortError::PathNotFound`] unless `path` exists.
pub fn ensure_exists(path: &std::path::Path) -> Result<(), WallsortError> {
    if path.exists() {
        Ok(())
    } else {
        Err(WallsortError::PathNotFound(path.to_path_buf()))
    }
}

/// Fail unless `path` exists and is a directory.
pub fn ensure_dir(path: &std::path::Path) -> Result<(), WallsortError> {
    ensure_exists(path)?;
    if path.is_dir() {
        Ok(())
    } else {
        Err(WallsortError::NotADirectory(path.to_path_buf()))
    }
}
