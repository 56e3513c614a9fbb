//! Session lifecycle bookkeeping.

use std::sync::Arc;

use super::error::SessionError;
use super::traits::{BrowserDriver, BrowserSession};
use crate::metrics::{SESSIONS_CLOSED, SESSIONS_OPENED};

/// Opens sessions navigated to a fixed URL and closes them tolerantly.
pub struct SessionDriver {
    driver: Arc<dyn BrowserDriver>,
    target_url: String,
}

impl SessionDriver {
    pub fn new(driver: Arc<dyn BrowserDriver>, target_url: impl Into<String>) -> Self {
        Self {
            driver,
            target_url: target_url.into(),
        }
    }

    /// Launches a session and navigates it to the target page.
    ///
    /// If navigation fails the session is closed before the error is
    /// returned, so a failed `open` never leaves anything running.
    pub async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        let mut session = self.driver.launch().await?;
        SESSIONS_OPENED.inc();

        if let Err(e) = session.goto(&self.target_url).await {
            self.close(session).await;
            return Err(e);
        }

        Ok(session)
    }

    /// Closes the session, logging rather than raising on failure.
    pub async fn close(&self, mut session: Box<dyn BrowserSession>) {
        if let Err(e) = session.close().await {
            tracing::warn!(driver = self.driver.name(), "Failed to close session: {}", e);
        }
        SESSIONS_CLOSED.inc();
    }
}
