//! Error types for the capture module.

use std::path::PathBuf;
use thiserror::Error;

use crate::browser::SessionError;

/// Errors that can occur while finalizing a download.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The transfer never produced a file.
    #[error("Download did not complete: {0}")]
    Download(#[from] SessionError),

    /// The temp file could not be inspected.
    #[error("Failed to read metadata for {path}")]
    Metadata {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to create the output directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to move/rename file.
    #[error("Failed to move file from {from} to {to}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to copy file.
    #[error("Failed to copy file from {from} to {to}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },
}
