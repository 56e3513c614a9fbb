use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Per-link failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The links file could not be read.
    #[error("Failed to read links from {path}: {error}")]
    LinkSource {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Another run is active on this controller.
    #[error("A run is already in progress")]
    AlreadyRunning,
}
