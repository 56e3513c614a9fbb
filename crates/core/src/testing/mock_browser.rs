//! Mock browser driver for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::browser::{BrowserDriver, BrowserSession, PendingDownload, Selector, SessionError};
use crate::steps::target;

/// Callback run at a scripted point of a session.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Presence {
    Absent,
    /// Visible once this many probes have come back empty.
    AfterProbes(u32),
}

#[derive(Debug, Clone)]
enum DownloadScript {
    Complete { bytes: u64 },
    Fail(String),
    NeverStarts,
}

/// How one session's page behaves.
///
/// Selectors that were never scripted are absent.
#[derive(Clone)]
pub struct PageScript {
    elements: HashMap<Selector, Presence>,
    probe_errors: HashMap<Selector, u32>,
    download: DownloadScript,
    launch_error: Option<String>,
    navigation_error: Option<String>,
    on_goto: Option<Hook>,
    on_download_click: Option<Hook>,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
            probe_errors: HashMap::new(),
            download: DownloadScript::NeverStarts,
            launch_error: None,
            navigation_error: None,
            on_goto: None,
            on_download_click: None,
        }
    }
}

impl PageScript {
    /// An empty page: nothing is found and no download starts.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Every control is present and the final click yields a file of
    /// `bytes` bytes.
    pub fn happy_path(bytes: u64) -> Self {
        let primary_input = target::link_input_strategies()
            .into_iter()
            .next()
            .map(|strategy| strategy.selector);

        let mut script = Self::blank()
            .with_element(target::consent_button())
            .with_element(target::fetch_button())
            .with_element(target::play_control())
            .with_element(target::final_download_button())
            .with_download_size(bytes);
        if let Some(selector) = primary_input {
            script = script.with_element(selector);
        }
        script
    }

    pub fn with_element(self, selector: Selector) -> Self {
        self.with_element_after(selector, 0)
    }

    /// The element appears after `probes` unsuccessful probes.
    pub fn with_element_after(mut self, selector: Selector, probes: u32) -> Self {
        self.elements.insert(selector, Presence::AfterProbes(probes));
        self
    }

    pub fn without_element(mut self, selector: Selector) -> Self {
        self.elements.insert(selector, Presence::Absent);
        self
    }

    /// The first `failures` probes for `selector` fail with a protocol
    /// error, as when the page re-renders mid-evaluation.
    pub fn with_probe_errors(mut self, selector: Selector, failures: u32) -> Self {
        self.probe_errors.insert(selector, failures);
        self
    }

    pub fn with_download_size(mut self, bytes: u64) -> Self {
        self.download = DownloadScript::Complete { bytes };
        self
    }

    /// The download starts but the browser reports it as failed.
    pub fn with_failed_download(mut self, reason: impl Into<String>) -> Self {
        self.download = DownloadScript::Fail(reason.into());
        self
    }

    /// The final click never starts a download.
    pub fn without_download(mut self) -> Self {
        self.download = DownloadScript::NeverStarts;
        self
    }

    pub fn failing_launch(mut self, reason: impl Into<String>) -> Self {
        self.launch_error = Some(reason.into());
        self
    }

    pub fn failing_navigation(mut self, reason: impl Into<String>) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    pub fn on_goto(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_goto = Some(Arc::new(hook));
        self
    }

    /// Runs after the final click, before the download is handed back.
    pub fn on_download_click(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_download_click = Some(Arc::new(hook));
        self
    }
}

/// Counters shared by a driver and every session it launched.
#[derive(Debug, Default)]
pub struct MockStats {
    launched: AtomicUsize,
    closed: AtomicUsize,
    close_calls: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    context_closes: AtomicUsize,
    discards: AtomicUsize,
    visited: Mutex<Vec<String>>,
    clicked: Mutex<Vec<String>>,
    filled: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Sessions that reached the closed state.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Calls to `close`, including repeated ones.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of sessions open at the same time.
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn context_closes(&self) -> usize {
        self.context_closes.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        lock(&self.visited).clone()
    }

    /// Clicked selectors, rendered with [`Selector`]'s `Display`.
    pub fn clicked(&self) -> Vec<String> {
        lock(&self.clicked).clone()
    }

    /// Text filled into inputs, in order.
    pub fn filled(&self) -> Vec<String> {
        lock(&self.filled).clone()
    }

    fn session_opened(&self) {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn session_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock implementation of [`BrowserDriver`].
///
/// Each launch takes the next queued [`PageScript`], or the default script
/// once the queue is empty.
///
/// # Example
///
/// ```rust,ignore
/// use teradl_core::testing::{MockBrowserDriver, PageScript};
///
/// let driver = MockBrowserDriver::new(staging_dir);
/// driver.push_script(PageScript::happy_path(1024));
/// driver.push_script(PageScript::happy_path(1024).without_element(fetch_button()));
///
/// controller.run(&links_path, sink).await?;
/// assert_eq!(driver.stats().closed(), 2);
/// ```
pub struct MockBrowserDriver {
    scripts: Mutex<VecDeque<PageScript>>,
    default_script: PageScript,
    staging_dir: PathBuf,
    stats: Arc<MockStats>,
}

impl MockBrowserDriver {
    /// Creates a driver whose sessions download into `staging_dir`. Unqueued
    /// launches get a 1 KiB happy path.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default_script: PageScript::happy_path(1024),
            staging_dir: staging_dir.into(),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Queues a script for the next launch.
    pub fn push_script(&self, script: PageScript) {
        lock(&self.scripts).push_back(script);
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    fn next_script(&self) -> PageScript {
        lock(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone())
    }
}

#[async_trait]
impl BrowserDriver for MockBrowserDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        let script = self.next_script();
        if let Some(reason) = &script.launch_error {
            return Err(SessionError::Launch(reason.clone()));
        }

        let download_dir = self.staging_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&download_dir).await?;
        self.stats.session_opened();

        Ok(Box::new(MockSession {
            script,
            stats: Arc::clone(&self.stats),
            probes: HashMap::new(),
            failed_probes: HashMap::new(),
            download_dir,
            context_open: true,
            closed: false,
        }))
    }
}

struct MockSession {
    script: PageScript,
    stats: Arc<MockStats>,
    probes: HashMap<Selector, u32>,
    failed_probes: HashMap<Selector, u32>,
    download_dir: PathBuf,
    context_open: bool,
    closed: bool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed || !self.context_open {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn visible(&self, selector: &Selector) -> bool {
        match self.script.elements.get(selector) {
            Some(Presence::AfterProbes(after)) => {
                self.probes.get(selector).copied().unwrap_or(0) > *after
            }
            Some(Presence::Absent) | None => false,
        }
    }

    fn require(&self, selector: &Selector) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.visible(selector) {
            Ok(())
        } else {
            Err(SessionError::ElementNotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        lock(&self.stats.visited).push(url.to_string());
        if let Some(hook) = &self.script.on_goto {
            hook();
        }
        match &self.script.navigation_error {
            Some(reason) => Err(SessionError::navigation(url, reason)),
            None => Ok(()),
        }
    }

    async fn probe(&mut self, selector: &Selector) -> Result<bool, SessionError> {
        self.ensure_open()?;
        let allowed = self.script.probe_errors.get(selector).copied().unwrap_or(0);
        let failed = self.failed_probes.entry(selector.clone()).or_insert(0);
        if *failed < allowed {
            *failed += 1;
            return Err(SessionError::protocol("Execution context was destroyed"));
        }
        *self.probes.entry(selector.clone()).or_insert(0) += 1;
        Ok(self.visible(selector))
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), SessionError> {
        self.require(selector)?;
        lock(&self.stats.clicked).push(selector.to_string());
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> Result<(), SessionError> {
        self.require(selector)?;
        lock(&self.stats.filled).push(text.to_string());
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &Selector) -> Result<(), SessionError> {
        self.require(selector)
    }

    async fn click_for_download(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Box<dyn PendingDownload>, SessionError> {
        self.require(selector)?;
        lock(&self.stats.clicked).push(selector.to_string());
        if let Some(hook) = &self.script.on_download_click {
            hook();
        }

        let download = match &self.script.download {
            DownloadScript::Complete { bytes } => {
                MockDownload::with_size(&self.download_dir, *bytes)?
            }
            DownloadScript::Fail(reason) => MockDownload::failing(reason.clone()),
            DownloadScript::NeverStarts => return Err(SessionError::DownloadTimeout(timeout)),
        };
        Ok(Box::new(download.tracked(Arc::clone(&self.stats))))
    }

    async fn close_context(&mut self) -> Result<(), SessionError> {
        if self.context_open {
            self.context_open = false;
            self.stats.context_closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Ok(());
        }
        self.close_context().await?;
        self.closed = true;
        self.stats.session_closed();

        match tokio::fs::remove_dir_all(&self.download_dir).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Mock implementation of [`PendingDownload`] backed by a real file.
pub struct MockDownload {
    temp: PathBuf,
    suggested_filename: String,
    failure: Option<String>,
    stats: Option<Arc<MockStats>>,
}

impl MockDownload {
    /// Creates a sparse temp file of `bytes` bytes in `dir`, so large
    /// sizes cost no disk space.
    pub fn with_size(dir: &Path, bytes: u64) -> std::io::Result<Self> {
        let temp = dir.join(Uuid::new_v4().to_string());
        File::create(&temp)?.set_len(bytes)?;
        Ok(Self {
            temp,
            suggested_filename: "video.mp4".to_string(),
            failure: None,
            stats: None,
        })
    }

    /// A transfer that ends in failure and produces no file.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            temp: PathBuf::new(),
            suggested_filename: "video.mp4".to_string(),
            failure: Some(reason.into()),
            stats: None,
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    fn tracked(mut self, stats: Arc<MockStats>) -> Self {
        self.stats = Some(stats);
        self
    }
}

#[async_trait]
impl PendingDownload for MockDownload {
    fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    async fn path(&mut self) -> Result<PathBuf, SessionError> {
        match &self.failure {
            Some(reason) => Err(SessionError::DownloadFailed(reason.clone())),
            None => Ok(self.temp.clone()),
        }
    }

    async fn discard(&mut self) -> Result<(), SessionError> {
        if let Some(stats) = &self.stats {
            stats.discards.fetch_add(1, Ordering::SeqCst);
        }
        if self.failure.is_some() {
            return Ok(());
        }
        match tokio::fs::remove_file(&self.temp).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
