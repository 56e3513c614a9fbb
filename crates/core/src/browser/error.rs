//! Error types for browser sessions.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser process or its context could not be started.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Navigating to the target page failed.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// An interaction required an element that is not on the page.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The download-started notification did not arrive in time.
    #[error("Download did not start within {0:?}")]
    DownloadTimeout(Duration),

    /// The transfer was cancelled or interrupted by the browser.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// The context or browser was already closed.
    #[error("Session closed")]
    Closed,

    /// DevTools protocol error.
    #[error("Browser protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol(err: impl ToString) -> Self {
        Self::Protocol(err.to_string())
    }

    /// Whether a repeated attempt may succeed, e.g. a script evaluated
    /// while the page was re-rendering.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_protocol_errors_are_transient() {
        assert!(SessionError::protocol("Execution context was destroyed").is_transient());
        assert!(!SessionError::Closed.is_transient());
        assert!(!SessionError::ElementNotFound("button".into()).is_transient());
        assert!(!SessionError::DownloadTimeout(Duration::from_secs(1)).is_transient());
    }
}
