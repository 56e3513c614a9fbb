//! Trait definitions for the browser module.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::error::SessionError;
use super::types::Selector;

/// Launches isolated browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Returns the name of this driver implementation.
    fn name(&self) -> &str;

    /// Starts a browser process with one fresh context and one blank page.
    ///
    /// On error nothing is left running.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SessionError>;
}

/// One browser process + context + page, used for exactly one link.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates the page and waits for it to load.
    async fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    /// Checks once, without waiting, whether the selector matches an element.
    async fn probe(&mut self, selector: &Selector) -> Result<bool, SessionError>;

    async fn click(&mut self, selector: &Selector) -> Result<(), SessionError>;

    /// Replaces the value of an input-like element.
    async fn fill(&mut self, selector: &Selector, text: &str) -> Result<(), SessionError>;

    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), SessionError>;

    /// Clicks the element and waits, concurrently, for the download it
    /// triggers to start. The listener is armed before the click.
    async fn click_for_download(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PendingDownload>, SessionError>;

    /// Closes the browsing context, cancelling in-flight network activity.
    /// The session must still be passed to `close`.
    async fn close_context(&mut self) -> Result<(), SessionError>;

    /// Closes the context (if still open) and the browser process, and
    /// removes the session's download directory. Safe to call after
    /// `close_context`.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// A transfer the page started but that has not been promoted or discarded.
#[async_trait]
pub trait PendingDownload: Send {
    /// Filename proposed by the server, informational only.
    fn suggested_filename(&self) -> &str;

    /// Waits for the transfer to finish and returns its temporary file.
    async fn path(&mut self) -> Result<PathBuf, SessionError>;

    /// Cancels the transfer if still running and removes its temporary file.
    async fn discard(&mut self) -> Result<(), SessionError>;
}
