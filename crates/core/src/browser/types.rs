use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// Element locator: a CSS selector, optionally narrowed to elements whose
/// visible text contains a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub css: String,
    pub text: Option<String>,
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(text.into()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}:has-text({:?})", self.css, text),
            None => f.write_str(&self.css),
        }
    }
}

/// Everything a driver needs to launch one session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub extra_args: Vec<String>,
    pub request_timeout: Duration,
    /// Parent of the per-session download directories.
    pub staging_dir: PathBuf,
}

impl LaunchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            executable: config.browser.executable.clone(),
            headless: config.browser.headless,
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
            extra_args: config.browser.extra_args.clone(),
            request_timeout: config.browser.launch_timeout(),
            staging_dir: config.downloads.staging_dir.clone(),
        }
    }
}
