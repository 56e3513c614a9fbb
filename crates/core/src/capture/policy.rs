use crate::config::DownloadsConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Deterministic output name for the link at 1-based `index`.
pub fn output_file_name(index: usize) -> String {
    format!("vid{}.mp4", index)
}

pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Upper bound on accepted file size. A file exactly at the ceiling is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCeiling {
    max_bytes: u64,
}

impl SizeCeiling {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &DownloadsConfig) -> Self {
        Self::new(config.max_file_size_bytes())
    }

    pub fn exceeds(&self, bytes: u64) -> bool {
        bytes > self.max_bytes
    }
}
