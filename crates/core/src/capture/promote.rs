//! Promotion of completed transfers into the output directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::error::CaptureError;
use super::policy::{megabytes, output_file_name, SizeCeiling};
use crate::browser::PendingDownload;
use crate::config::DownloadsConfig;
use crate::events::RunLogger;
use crate::metrics::{BYTES_SAVED, DOWNLOAD_SIZE_MB};

/// What happened to a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Promoted to `path` in the output directory.
    Saved { path: PathBuf, bytes: u64 },
    /// Over the size ceiling; the temp file was removed.
    Rejected { bytes: u64 },
}

/// Applies the size ceiling and persists accepted files as `vid<N>.mp4`.
#[derive(Debug, Clone)]
pub struct DownloadCapture {
    output_dir: PathBuf,
    ceiling: SizeCeiling,
}

impl DownloadCapture {
    pub fn new(output_dir: impl Into<PathBuf>, ceiling: SizeCeiling) -> Self {
        Self {
            output_dir: output_dir.into(),
            ceiling,
        }
    }

    pub fn from_config(config: &DownloadsConfig) -> Self {
        Self::new(config.output_dir.clone(), SizeCeiling::from_config(config))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Waits for the transfer, then either promotes it to
    /// `output_dir/vid{index}.mp4` or removes it.
    ///
    /// An existing file under the same name is replaced.
    pub async fn capture(
        &self,
        download: &mut dyn PendingDownload,
        index: usize,
        log: &RunLogger,
    ) -> Result<CaptureOutcome, CaptureError> {
        let temp = download.path().await?;
        let bytes = fs::metadata(&temp)
            .await
            .map_err(|error| CaptureError::Metadata {
                path: temp.clone(),
                error,
            })?
            .len();
        let size_mb = megabytes(bytes);
        DOWNLOAD_SIZE_MB.observe(size_mb);

        if self.ceiling.exceeds(bytes) {
            log.warn(format!("File too large ({:.2} MB), skipping.", size_mb));
            if let Err(e) = remove_if_present(&temp).await {
                warn!(path = %temp.display(), error = %e, "Failed to remove rejected download");
            }
            return Ok(CaptureOutcome::Rejected { bytes });
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|error| CaptureError::DirectoryCreationFailed {
                path: self.output_dir.clone(),
                error,
            })?;

        let name = output_file_name(index);
        let destination = self.output_dir.join(&name);
        promote(&temp, &destination).await?;
        BYTES_SAVED.inc_by(bytes);
        log.success(format!("Downloaded as {}", name));

        if let Err(e) = remove_if_present(&temp).await {
            log.warn(format!("Failed to delete temp file: {}", e));
        }

        Ok(CaptureOutcome::Saved {
            path: destination,
            bytes,
        })
    }
}

/// Renames `source` onto `destination`, falling back to a copy when the
/// two are on different filesystems. A partial copy is removed.
async fn promote(source: &Path, destination: &Path) -> Result<(), CaptureError> {
    match fs::rename(source, destination).await {
        Ok(()) => return Ok(()),
        // Cross-filesystem moves fail with EXDEV (18 on Linux)
        Err(e) if e.kind() == ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            debug!(
                from = %source.display(),
                to = %destination.display(),
                "Rename crosses filesystems, copying"
            );
        }
        Err(error) => {
            return Err(CaptureError::MoveFailed {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                error,
            })
        }
    }

    if let Err(error) = fs::copy(source, destination).await {
        let _ = fs::remove_file(destination).await;
        return Err(CaptureError::CopyFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            error,
        });
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
