//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable browser so the pipeline can be run end
//! to end without launching a real browser.
//!
//! # Example
//!
//! ```rust,ignore
//! use teradl_core::testing::{fixtures, MockBrowserDriver, PageScript};
//!
//! let driver = Arc::new(MockBrowserDriver::new(dir.path().join("staging")));
//! driver.push_script(PageScript::happy_path(150 * 1024 * 1024));
//!
//! let controller = PipelineController::new(driver.clone(), &fixtures::test_config(dir.path()));
//! ```

mod mock_browser;

pub use mock_browser::{Hook, MockBrowserDriver, MockDownload, MockStats, PageScript};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::config::{Config, FlowConfig};

    /// Step timings short enough for tests: every wait gives up within a
    /// few milliseconds.
    pub fn fast_flow() -> FlowConfig {
        FlowConfig {
            poll_interval_ms: 1,
            consent_timeout_ms: 5,
            input_timeout_ms: 5,
            fetch_timeout_ms: 10,
            play_probe_attempts: 3,
            play_probe_interval_ms: 1,
            play_settle_ms: 0,
            final_timeout_ms: 10,
            final_settle_ms: 0,
            download_start_timeout_ms: 10,
            ..FlowConfig::default()
        }
    }

    /// Config rooted in `dir`: output in `dir/out`, staging in
    /// `dir/staging`, fast step timings.
    pub fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.downloads.output_dir = dir.join("out");
        config.downloads.staging_dir = dir.join("staging");
        config.flow = fast_flow();
        config
    }

    /// Writes a links file with one entry per line.
    pub fn links_file(dir: &Path, lines: &[&str]) -> std::io::Result<PathBuf> {
        let path = dir.join("links.txt");
        std::fs::write(&path, lines.join("\n"))?;
        Ok(path)
    }
}
