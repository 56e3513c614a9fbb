//! Pipeline controller.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::context::RunContext;
use super::error::PipelineError;
use super::types::{LinkOutcome, RunStatus, RunSummary};
use crate::browser::{BrowserDriver, BrowserSession, SessionDriver};
use crate::capture::{CaptureOutcome, DownloadCapture};
use crate::config::{Config, FlowConfig};
use crate::events::{LogLevel, LogSink, RunLogger};
use crate::links::{read_links, Link};
use crate::metrics::LINKS_PROCESSED;
use crate::steps::{target, FlowOutcome, Step, StepExecutor};

/// Drives one run at a time over a links file.
///
/// Every link gets its own browser session, closed on every exit path
/// before the next link starts. Failures are logged and contained to the
/// link that caused them.
pub struct PipelineController {
    sessions: SessionDriver,
    capture: DownloadCapture,
    flow: FlowConfig,
    context: Arc<RunContext>,
    running: AtomicBool,
    last_summary: RwLock<Option<RunSummary>>,
}

impl PipelineController {
    /// Creates a controller that drives the fixed target page.
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &Config) -> Self {
        Self::with_target(driver, config, target::TARGET_URL)
    }

    /// Creates a controller that navigates sessions to `target_url`.
    pub fn with_target(
        driver: Arc<dyn BrowserDriver>,
        config: &Config,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionDriver::new(driver, target_url),
            capture: DownloadCapture::from_config(&config.downloads),
            flow: config.flow.clone(),
            context: Arc::new(RunContext::new()),
            running: AtomicBool::new(false),
            last_summary: RwLock::new(None),
        }
    }

    pub fn context(&self) -> Arc<RunContext> {
        Arc::clone(&self.context)
    }

    /// Stops the run before its next link. Latched until the next run.
    pub fn request_stop(&self) {
        info!("Stop requested");
        self.context.request_stop();
    }

    /// Skips the current link at its next skip checkpoint.
    pub fn request_skip(&self) {
        info!("Skip requested");
        self.context.request_skip();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.read().await.clone()
    }

    pub async fn status(&self) -> RunStatus {
        RunStatus {
            running: self.is_running(),
            stop_requested: self.context.stop_requested(),
            skip_pending: self.context.skip_pending(),
            last_summary: self.last_summary().await,
        }
    }

    /// Processes every link in `links_path`, in order, reporting progress to
    /// `sink`.
    ///
    /// Stop and skip signals are cleared when the run starts. Only a missing
    /// or unreadable links file, or an overlapping run, is an error; failures
    /// of individual links are logged and counted in the summary.
    pub async fn run(
        &self,
        links_path: &Path,
        sink: Arc<dyn LogSink>,
    ) -> Result<RunSummary, PipelineError> {
        let log = RunLogger::new(sink);

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log.error("A run is already in progress.");
            return Err(PipelineError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_links(run_id, links_path, &log)
            .instrument(span)
            .await
    }

    async fn run_links(
        &self,
        run_id: Uuid,
        links_path: &Path,
        log: &RunLogger,
    ) -> Result<RunSummary, PipelineError> {
        self.context.reset();

        let links = match read_links(links_path).await {
            Ok(links) => links,
            Err(error) => {
                log.error(format!("Fatal error: {}", error));
                return Err(PipelineError::LinkSource {
                    path: links_path.to_path_buf(),
                    error,
                });
            }
        };

        let output_dir = self.capture.output_dir();
        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            log.warn(format!(
                "Could not create output folder {}: {}",
                output_dir.display(),
                e
            ));
        }

        let total = links.len();
        info!(total, path = %links_path.display(), "Run started");
        let mut summary = RunSummary::new(run_id, total);

        for (i, link) in links.iter().enumerate() {
            if self.context.stop_requested() {
                log.info("⛔", "Download Stopped.");
                summary.stopped_early = true;
                break;
            }

            let index = i + 1;
            log.header(
                LogLevel::Info,
                "🔗",
                format!("Processing link {} of {}", index, total),
            );
            log.info("📎", link.as_str());

            let outcome = self.process_link(link, index, log).await;
            LINKS_PROCESSED.with_label_values(&[outcome.as_str()]).inc();
            summary.record(outcome);
        }

        log.header(LogLevel::Success, "✅", "All Links Processed");
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            stopped_early = summary.stopped_early,
            "Run finished"
        );

        *self.last_summary.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// Opens a session, drives it, and closes it whatever happened.
    ///
    /// A skip request belongs to the link it was made during; one that no
    /// checkpoint consumed is dropped here.
    async fn process_link(&self, link: &Link, index: usize, log: &RunLogger) -> LinkOutcome {
        let outcome = match self.sessions.open().await {
            Ok(mut session) => {
                let outcome = self.drive(session.as_mut(), link, index, log).await;
                self.sessions.close(session).await;
                outcome
            }
            Err(e) => {
                log.error(format!("Error: {}", e));
                LinkOutcome::Failed
            }
        };

        if self.context.take_skip() {
            debug!(index, "Dropping unconsumed skip request");
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        link: &Link,
        index: usize,
        log: &RunLogger,
    ) -> LinkOutcome {
        let flow = StepExecutor::new(session, &self.context, log, &self.flow)
            .run(link)
            .await;

        let mut download = match flow {
            Ok(FlowOutcome::DownloadStarted(download)) => download,
            Ok(FlowOutcome::Skipped) => return LinkOutcome::Skipped,
            Ok(FlowOutcome::Aborted { step, .. }) if step == Step::FinalDownload => {
                return LinkOutcome::Failed
            }
            Ok(FlowOutcome::Aborted { .. }) => return LinkOutcome::Skipped,
            Err(e) => {
                log.error(format!("Error: {}", e));
                return LinkOutcome::Failed;
            }
        };

        match self.capture.capture(download.as_mut(), index, log).await {
            Ok(CaptureOutcome::Saved { .. }) => LinkOutcome::Saved,
            Ok(CaptureOutcome::Rejected { .. }) => LinkOutcome::Skipped,
            Err(e) => {
                log.error(format!("Error: {}", e));
                if let Err(e) = download.discard().await {
                    warn!(error = %e, "Failed to discard download");
                }
                LinkOutcome::Failed
            }
        }
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
