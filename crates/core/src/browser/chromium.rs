//! Chromium backend over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, CancelDownloadParams, DownloadProgressState, EventDownloadProgress,
    EventDownloadWillBegin, SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SessionError;
use super::traits::{BrowserDriver, BrowserSession, PendingDownload};
use super::types::{LaunchOptions, Selector};

/// Attribute the locate script puts on the element it resolved, so that
/// follow-up CDP element calls can address it with plain CSS.
const MARK_ATTR: &str = "data-teradl-target";

/// Download events carry no session id, so they only reach listeners
/// registered on the browser connection. Downloads share the handle with
/// their session for those listeners and for cancellation.
type SharedBrowser = Arc<Mutex<Option<Browser>>>;

/// Launches a fresh Chromium-family browser for every session.
pub struct ChromiumDriver {
    options: LaunchOptions,
}

impl ChromiumDriver {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    fn chrome_config(&self) -> Result<ChromeConfig, SessionError> {
        let options = &self.options;
        let mut builder = ChromeConfig::builder()
            .window_size(options.viewport_width, options.viewport_height)
            .viewport(Viewport {
                width: options.viewport_width,
                height: options.viewport_height,
                ..Default::default()
            })
            .request_timeout(options.request_timeout)
            .args(options.extra_args.clone());

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(SessionError::Launch)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        let download_dir = self.options.staging_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&download_dir).await?;

        let config = match self.chrome_config() {
            Ok(config) => config,
            Err(e) => {
                remove_dir_quietly(&download_dir).await;
                return Err(e);
            }
        };

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                remove_dir_quietly(&download_dir).await;
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Arc::new(Mutex::new(Some(browser))),
            page: None,
            context_id: None,
            handler_task: Some(handler_task),
            download_dir,
        };

        if let Err(e) = session.prepare().await {
            let _ = session.close().await;
            return Err(e);
        }

        info!(dir = %session.download_dir.display(), "Browser session launched");
        Ok(Box::new(session))
    }
}

struct ChromiumSession {
    browser: SharedBrowser,
    page: Option<Page>,
    context_id: Option<BrowserContextId>,
    handler_task: Option<JoinHandle<()>>,
    download_dir: PathBuf,
}

impl ChromiumSession {
    /// Creates the isolated context, routes its downloads into the session
    /// directory and opens a blank page in it.
    async fn prepare(&mut self) -> Result<(), SessionError> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(SessionError::Closed)?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?
            .result
            .browser_context_id;
        self.context_id = Some(context_id.clone());

        let mut behavior = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::AllowAndName);
        behavior.download_path = Some(self.download_dir.to_string_lossy().into_owned());
        behavior.browser_context_id = Some(context_id.clone());
        behavior.events_enabled = Some(true);
        browser
            .execute(behavior)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        self.page = Some(page);

        Ok(())
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page.as_ref().ok_or(SessionError::Closed)
    }

    /// Evaluates a script that returns a boolean.
    async fn run_script(&self, script: String) -> Result<bool, SessionError> {
        let mut params = EvaluateParams::new(script);
        params.return_by_value = Some(true);
        self.page()?
            .evaluate_expression(params)
            .await
            .map_err(SessionError::protocol)?
            .into_value::<bool>()
            .map_err(SessionError::protocol)
    }

    /// Resolves the selector in the page and marks the match.
    async fn mark(&self, selector: &Selector) -> Result<bool, SessionError> {
        self.run_script(mark_script(selector)).await
    }

    async fn marked_element(
        &self,
        selector: &Selector,
    ) -> Result<chromiumoxide::element::Element, SessionError> {
        if !self.mark(selector).await? {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        self.page()?
            .find_element(format!("[{MARK_ATTR}]"))
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| SessionError::navigation(url, e))?;
        Ok(())
    }

    async fn probe(&mut self, selector: &Selector) -> Result<bool, SessionError> {
        self.mark(selector).await
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), SessionError> {
        let element = self.marked_element(selector).await?;
        element.click().await.map_err(SessionError::protocol)?;
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> Result<(), SessionError> {
        if !self.mark(selector).await? {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        if !self.run_script(fill_script(text)).await? {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), SessionError> {
        let element = self.marked_element(selector).await?;
        element
            .scroll_into_view()
            .await
            .map_err(SessionError::protocol)?;
        Ok(())
    }

    async fn click_for_download(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PendingDownload>, SessionError> {
        // Subscribe before clicking so neither notification can be missed.
        let (mut will_begin, progress) = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(SessionError::Closed)?;
            let will_begin = browser
                .event_listener::<EventDownloadWillBegin>()
                .await
                .map_err(SessionError::protocol)?;
            let progress = browser
                .event_listener::<EventDownloadProgress>()
                .await
                .map_err(SessionError::protocol)?;
            (will_begin, progress)
        };

        let element = self.marked_element(selector).await?;
        element.click().await.map_err(SessionError::protocol)?;

        let event = tokio::time::timeout(timeout, will_begin.next())
            .await
            .map_err(|_| SessionError::DownloadTimeout(timeout))?
            .ok_or(SessionError::Closed)?;
        debug!(guid = %event.guid, url = %event.url, "Download started");

        Ok(Box::new(ChromiumDownload {
            browser: Arc::clone(&self.browser),
            context_id: self.context_id.clone(),
            guid: event.guid.clone(),
            suggested_filename: event.suggested_filename.clone(),
            download_dir: self.download_dir.clone(),
            progress,
        }))
    }

    async fn close_context(&mut self) -> Result<(), SessionError> {
        self.page = None;
        let Some(context_id) = self.context_id.take() else {
            return Ok(());
        };
        let guard = self.browser.lock().await;
        let Some(browser) = guard.as_ref() else {
            return Ok(());
        };
        browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
            .map_err(SessionError::protocol)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let context_result = self.close_context().await;

        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                debug!("Browser close request failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed waiting for browser exit: {}", e);
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        remove_dir_quietly(&self.download_dir).await;

        context_result
    }
}

struct ChromiumDownload {
    browser: SharedBrowser,
    context_id: Option<BrowserContextId>,
    guid: String,
    suggested_filename: String,
    download_dir: PathBuf,
    progress: EventStream<EventDownloadProgress>,
}

#[async_trait]
impl PendingDownload for ChromiumDownload {
    fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    async fn path(&mut self) -> Result<PathBuf, SessionError> {
        while let Some(event) = self.progress.next().await {
            if event.guid != self.guid {
                continue;
            }
            if let Some(result) = transfer_result(&self.download_dir, &self.guid, &event.state) {
                return result;
            }
        }
        Err(SessionError::Closed)
    }

    async fn discard(&mut self) -> Result<(), SessionError> {
        {
            let guard = self.browser.lock().await;
            if let Some(browser) = guard.as_ref() {
                let mut cancel = CancelDownloadParams::new(self.guid.clone());
                cancel.browser_context_id = self.context_id.clone();
                if let Err(e) = browser.execute(cancel).await {
                    debug!(guid = %self.guid, "Cancel download request failed: {}", e);
                }
            }
        }

        let path = self.download_dir.join(&self.guid);
        for candidate in [path.clone(), path.with_extension("crdownload")] {
            match tokio::fs::remove_file(&candidate).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Maps a progress state of download `guid` to its final result, or `None`
/// while the transfer is still running.
fn transfer_result(
    download_dir: &Path,
    guid: &str,
    state: &DownloadProgressState,
) -> Option<Result<PathBuf, SessionError>> {
    match state {
        DownloadProgressState::InProgress => None,
        // With `AllowAndName` the browser names the file after the guid.
        DownloadProgressState::Completed => Some(Ok(download_dir.join(guid))),
        DownloadProgressState::Canceled => Some(Err(SessionError::DownloadFailed(
            "transfer cancelled by the browser".to_string(),
        ))),
    }
}

async fn remove_dir_quietly(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), "Failed to remove session directory: {}", e),
    }
}

fn json_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Finds the first visible element matching the CSS selector (and, if given,
/// whose whitespace-normalized text contains the label, case-insensitively)
/// and marks it, clearing any previous mark. Returns whether one was found.
fn mark_script(selector: &Selector) -> String {
    let css = json_literal(&selector.css);
    let text = json_literal(&selector.text);
    format!(
        r#"(() => {{
    const css = {css};
    const text = {text};
    for (const old of document.querySelectorAll('[{MARK_ATTR}]')) {{
        old.removeAttribute('{MARK_ATTR}');
    }}
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
    const visible = (n) => n.offsetParent !== null || n.getClientRects().length > 0;
    const candidates = Array.from(document.querySelectorAll(css)).filter(visible);
    const el = text === null
        ? candidates[0]
        : candidates.find((n) => norm(n.textContent).includes(norm(text)));
    if (!el) return false;
    el.setAttribute('{MARK_ATTR}', '');
    return true;
}})()"#
    )
}

/// Sets the marked element's value through the native setter so that
/// framework-controlled inputs observe the change.
fn fill_script(value: &str) -> String {
    let value = json_literal(value);
    format!(
        r#"(() => {{
    const el = document.querySelector('[{MARK_ATTR}]');
    if (!el) return false;
    el.focus();
    const proto = el instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value});
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_script_escapes_selector() {
        let script = mark_script(&Selector::css(r#"input[placeholder*="Terabox"]"#));
        assert!(script.contains(r#"const css = "input[placeholder*=\"Terabox\"]";"#));
        assert!(script.contains("const text = null;"));
    }

    #[test]
    fn test_mark_script_with_text() {
        let script = mark_script(&Selector::with_text("button", "Download & Stream"));
        assert!(script.contains(r#"const text = "Download & Stream";"#));
        assert!(script.contains(MARK_ATTR));
    }

    #[test]
    fn test_mark_script_skips_hidden_elements() {
        let script = mark_script(&Selector::with_text("button", "Download Video"));
        assert!(script.contains("getClientRects()"));
        assert!(script.contains(".filter(visible)"));
    }

    #[test]
    fn test_completed_transfer_is_named_after_guid() {
        let dir = Path::new("/tmp/staging/session");
        let result = transfer_result(dir, "3f2a", &DownloadProgressState::Completed);
        assert_eq!(result.unwrap().unwrap(), dir.join("3f2a"));
    }

    #[test]
    fn test_transfer_states() {
        let dir = Path::new("/tmp/staging/session");
        assert!(transfer_result(dir, "3f2a", &DownloadProgressState::InProgress).is_none());
        assert!(matches!(
            transfer_result(dir, "3f2a", &DownloadProgressState::Canceled),
            Some(Err(SessionError::DownloadFailed(_)))
        ));
    }

    #[test]
    fn test_fill_script_escapes_value() {
        let script = fill_script("https://x/?a=\"b\"");
        assert!(script.contains(r#"set.call(el, "https://x/?a=\"b\"")"#));
    }
}
