//! Step sequence for one link.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::target::{self, FETCH_LABEL, TARGET_NAME};
use super::types::{FlowOutcome, Step, StepOutcome};
use crate::browser::{BrowserSession, Selector, SessionError};
use crate::config::FlowConfig;
use crate::events::RunLogger;
use crate::links::Link;
use crate::metrics::STEP_FAILURES;
use crate::pipeline::RunContext;

/// Runs the fixed interaction sequence against an open session.
///
/// Missing optional elements are logged and skipped over. A missing
/// mandatory element ends the flow with [`FlowOutcome::Aborted`]; the
/// abort has already been logged when it is returned. Protocol errors that
/// no step policy covers are returned as `Err` for the caller to log.
pub struct StepExecutor<'a> {
    session: &'a mut dyn BrowserSession,
    context: &'a RunContext,
    log: &'a RunLogger,
    flow: &'a FlowConfig,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        session: &'a mut dyn BrowserSession,
        context: &'a RunContext,
        log: &'a RunLogger,
        flow: &'a FlowConfig,
    ) -> Self {
        Self {
            session,
            context,
            log,
            flow,
        }
    }

    pub async fn run(&mut self, link: &Link) -> Result<FlowOutcome, SessionError> {
        self.log.info("🌐", format!("Opened {}", TARGET_NAME));

        if let StepOutcome::Soft(reason) = self.dismiss_consent().await {
            self.record_soft(Step::Consent, &reason);
        }
        if let StepOutcome::Soft(reason) = self.submit_link(link).await? {
            self.record_soft(Step::SubmitLink, &reason);
        }

        if let StepOutcome::Abort(reason) = self.trigger_fetch().await {
            return Ok(aborted(Step::Fetch, reason));
        }

        if self.flow.variant.has_play_step() {
            if let StepOutcome::Abort(reason) = self.trigger_play().await {
                return Ok(aborted(Step::Play, reason));
            }
        }

        self.trigger_final_download().await
    }

    /// One probe, with transient protocol errors read as "not yet".
    async fn probe_once(&mut self, selector: &Selector) -> Result<bool, SessionError> {
        match self.session.probe(selector).await {
            Err(e) if e.is_transient() => {
                debug!(%selector, error = %e, "Probe failed, retrying");
                Ok(false)
            }
            other => other,
        }
    }

    /// Polls for the selector until it matches or the timeout elapses.
    async fn wait_for(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.probe_once(selector).await? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(self.flow.poll_interval().min(deadline - now)).await;
        }
    }

    /// Probes a fixed number of times with a fixed delay between attempts.
    async fn probe_repeatedly(
        &mut self,
        selector: &Selector,
        attempts: u32,
        interval: Duration,
    ) -> Result<bool, SessionError> {
        for attempt in 1..=attempts {
            if self.probe_once(selector).await? {
                debug!(%selector, attempt, "Element found");
                return Ok(true);
            }
            if attempt < attempts {
                sleep(interval).await;
            }
        }
        Ok(false)
    }

    async fn dismiss_consent(&mut self) -> StepOutcome {
        let button = target::consent_button();
        let result = match self.wait_for(&button, self.flow.consent_timeout()).await {
            Ok(true) => self.session.click(&button).await.map(|_| true),
            other => other,
        };

        match result {
            Ok(true) => {
                self.log.info("🍪", "Cookie popup accepted.");
                StepOutcome::Done
            }
            Ok(false) => {
                self.log.info("👍", "No cookie popup or already accepted.");
                StepOutcome::Soft("consent dialog absent".into())
            }
            Err(e) => {
                debug!(error = %e, "Consent dismissal failed");
                self.log.info("👍", "No cookie popup or already accepted.");
                StepOutcome::Soft(e.to_string())
            }
        }
    }

    /// Walks the input fallback chain; the first strategy that finds an
    /// element and accepts the text wins.
    async fn submit_link(&mut self, link: &Link) -> Result<StepOutcome, SessionError> {
        let strategies = target::link_input_strategies();
        let last = strategies.len().saturating_sub(1);

        for (i, strategy) in strategies.into_iter().enumerate() {
            let wait = strategy.wait.unwrap_or_else(|| self.flow.input_timeout());
            let found = if wait.is_zero() {
                self.probe_once(&strategy.selector).await
            } else {
                self.wait_for(&strategy.selector, wait).await
            };

            match found {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if i < last => {
                    debug!(strategy = strategy.label, error = %e, "Input strategy failed");
                    continue;
                }
                Err(e) => return Err(e),
            }

            match self.session.fill(&strategy.selector, link.as_str()).await {
                Ok(()) => {
                    if i == 0 {
                        self.log.info("📋", "Pasted link into input.");
                    } else {
                        self.log
                            .info("📋", format!("Pasted link using {}.", strategy.label));
                    }
                    return Ok(StepOutcome::Done);
                }
                // The last strategy has nothing to fall back to.
                Err(e) if i == last => return Err(e),
                Err(e) => {
                    debug!(strategy = strategy.label, error = %e, "Fill failed");
                }
            }
        }

        self.log.warn("Could not find input field to paste link.");
        Ok(StepOutcome::Soft("no input field".into()))
    }

    async fn trigger_fetch(&mut self) -> StepOutcome {
        let button = target::fetch_button();
        let result = match self.wait_for(&button, self.flow.fetch_timeout()).await {
            Ok(true) => self.session.click(&button).await.map(|_| true),
            other => other,
        };

        match result {
            Ok(true) => {
                self.log
                    .info("🎬", format!("Clicked '{}' button...", FETCH_LABEL));
                StepOutcome::Done
            }
            Ok(false) => self.abort_step(
                Step::Fetch,
                format!("'{}' button not found", FETCH_LABEL),
            ),
            Err(e) => self.abort_step(Step::Fetch, e.to_string()),
        }
    }

    async fn trigger_play(&mut self) -> StepOutcome {
        let control = target::play_control();
        let found = self
            .probe_repeatedly(
                &control,
                self.flow.play_probe_attempts,
                self.flow.play_probe_interval(),
            )
            .await;

        let result = match found {
            Ok(true) => match self.session.scroll_into_view(&control).await {
                Ok(()) => self.session.click(&control).await.map(|_| true),
                Err(e) => Err(e),
            },
            other => other,
        };

        match result {
            Ok(true) => {
                self.log
                    .info("▶️", "Clicked play button to load download page...");
                sleep(self.flow.play_settle()).await;
                StepOutcome::Done
            }
            Ok(false) => self.abort_step(Step::Play, "Play button not found".into()),
            Err(e) => self.abort_step(Step::Play, e.to_string()),
        }
    }

    async fn trigger_final_download(&mut self) -> Result<FlowOutcome, SessionError> {
        let button = target::final_download_button();

        let located = match self.wait_for(&button, self.flow.final_timeout()).await {
            Ok(true) => self.session.scroll_into_view(&button).await,
            Ok(false) => Err(SessionError::ElementNotFound(button.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = located {
            return Ok(self.final_failure(e));
        }
        sleep(self.flow.final_settle()).await;

        if let StepOutcome::Skipped = self.skip_checkpoint() {
            self.log.info("⏭️", "Skipped before clicking final download.");
            self.force_close_context().await;
            return Ok(FlowOutcome::Skipped);
        }

        let mut download = match self
            .session
            .click_for_download(&button, self.flow.download_start_timeout())
            .await
        {
            Ok(download) => download,
            Err(e) => return Ok(self.final_failure(e)),
        };
        self.log.info("⬇️", "Final download started...");

        if let StepOutcome::Skipped = self.skip_checkpoint() {
            self.log.info("⏭️", "Skipping active download...");
            if let Err(e) = download.discard().await {
                warn!(error = %e, "Failed to discard skipped download");
            }
            self.force_close_context().await;
            return Ok(FlowOutcome::Skipped);
        }

        Ok(FlowOutcome::DownloadStarted(download))
    }

    /// Consumes a pending skip request.
    fn skip_checkpoint(&self) -> StepOutcome {
        if self.context.take_skip() {
            StepOutcome::Skipped
        } else {
            StepOutcome::Done
        }
    }

    fn record_soft(&self, step: Step, reason: &str) {
        debug!(%step, reason, "Optional step fell through");
        STEP_FAILURES.with_label_values(&[step.as_str()]).inc();
    }

    fn abort_step(&self, step: Step, reason: String) -> StepOutcome {
        self.log.warn(format!("{}, skipping...", reason));
        STEP_FAILURES.with_label_values(&[step.as_str()]).inc();
        StepOutcome::Abort(reason)
    }

    fn final_failure(&self, error: SessionError) -> FlowOutcome {
        self.log
            .error(format!("Error clicking final download: {}", error));
        STEP_FAILURES
            .with_label_values(&[Step::FinalDownload.as_str()])
            .inc();
        aborted(Step::FinalDownload, error.to_string())
    }

    async fn force_close_context(&mut self) {
        if let Err(e) = self.session.close_context().await {
            warn!(error = %e, "Failed to close browser context");
        }
    }
}

fn aborted(step: Step, reason: String) -> FlowOutcome {
    FlowOutcome::Aborted { step, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserDriver;
    use crate::config::FlowVariant;
    use crate::events::MemorySink;
    use crate::testing::{fixtures, MockBrowserDriver, MockStats, PageScript};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        _temp: TempDir,
        stats: Arc<MockStats>,
        sink: MemorySink,
        outcome: FlowOutcome,
    }

    async fn run_flow(script: PageScript, flow: FlowConfig, context: &RunContext) -> Harness {
        let temp = TempDir::new().unwrap();
        let driver = MockBrowserDriver::new(temp.path().join("staging"));
        driver.push_script(script);
        let stats = driver.stats();
        let sink = MemorySink::new();
        let log = RunLogger::new(Arc::new(sink.clone()));
        let link = crate::links::parse_links("https://terabox.example/s/abc").remove(0);

        let mut session = driver.launch().await.unwrap();
        let outcome = StepExecutor::new(session.as_mut(), context, &log, &flow)
            .run(&link)
            .await
            .unwrap();
        session.close().await.unwrap();

        Harness {
            _temp: temp,
            stats,
            sink,
            outcome,
        }
    }

    #[tokio::test]
    async fn test_happy_path_clicks_every_control() {
        let context = RunContext::new();
        let h = run_flow(PageScript::happy_path(1024), fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert_eq!(
            h.stats.clicked(),
            vec![
                target::consent_button().to_string(),
                target::fetch_button().to_string(),
                target::play_control().to_string(),
                target::final_download_button().to_string(),
            ]
        );
        assert_eq!(h.stats.filled(), vec!["https://terabox.example/s/abc"]);
        assert!(h.sink.contains("Cookie popup accepted."));
        assert!(h.sink.contains("Pasted link into input."));
        assert!(h.sink.contains("Final download started..."));
    }

    #[tokio::test]
    async fn test_direct_variant_skips_play() {
        let context = RunContext::new();
        let flow = FlowConfig {
            variant: FlowVariant::Direct,
            ..fixtures::fast_flow()
        };
        let script = PageScript::happy_path(1024).without_element(target::play_control());

        let h = run_flow(script, flow, &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(!h.stats.clicked().contains(&target::play_control().to_string()));
    }

    #[tokio::test]
    async fn test_missing_consent_is_not_an_error() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).without_element(target::consent_button());

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(h.sink.contains("No cookie popup or already accepted."));
    }

    #[tokio::test]
    async fn test_link_input_falls_back_to_generic_selector() {
        let context = RunContext::new();
        let strategies = target::link_input_strategies();
        let script = PageScript::happy_path(1024)
            .without_element(strategies[0].selector.clone())
            .with_element(strategies[1].selector.clone());

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert_eq!(h.stats.filled().len(), 1);
        assert!(h.sink.contains("Pasted link using fallback input selector."));
    }

    #[tokio::test]
    async fn test_no_input_warns_and_continues() {
        let context = RunContext::new();
        let primary = target::link_input_strategies()[0].selector.clone();
        let script = PageScript::happy_path(1024).without_element(primary);

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(h.stats.filled().is_empty());
        let warning = h
            .sink
            .events()
            .into_iter()
            .find(|e| e.message == "Could not find input field to paste link.")
            .unwrap();
        assert_eq!(warning.level, crate::events::LogLevel::Warning);
    }

    #[tokio::test]
    async fn test_missing_fetch_button_aborts() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).without_element(target::fetch_button());

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        match h.outcome {
            FlowOutcome::Aborted { step, .. } => assert_eq!(step, Step::Fetch),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(h
            .sink
            .contains("'Download & Stream' button not found, skipping..."));
        assert!(!h
            .stats
            .clicked()
            .contains(&target::final_download_button().to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_control_found_after_retries() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).with_element_after(target::play_control(), 7);

        let h = run_flow(script, FlowConfig::default(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(h.sink.contains("Clicked play button to load download page..."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_control_gives_up_after_attempts() {
        let context = RunContext::new();
        let flow = FlowConfig::default();
        let script = PageScript::happy_path(1024)
            .with_element_after(target::play_control(), flow.play_probe_attempts);

        let h = run_flow(script, flow, &context).await;

        match h.outcome {
            FlowOutcome::Aborted { step, .. } => assert_eq!(step, Step::Play),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(h.sink.contains("Play button not found, skipping..."));
    }

    #[tokio::test]
    async fn test_skip_before_final_click_closes_context() {
        let context = RunContext::new();
        context.request_skip();

        let h = run_flow(PageScript::happy_path(1024), fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::Skipped));
        assert!(!context.skip_pending());
        assert_eq!(h.stats.context_closes(), 1);
        assert!(!h
            .stats
            .clicked()
            .contains(&target::final_download_button().to_string()));
        assert!(h.sink.contains("Skipped before clicking final download."));
    }

    #[tokio::test]
    async fn test_skip_during_download_start_discards() {
        let context = Arc::new(RunContext::new());
        let hook_context = Arc::clone(&context);
        let script =
            PageScript::happy_path(1024).on_download_click(move || hook_context.request_skip());

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::Skipped));
        assert!(!context.skip_pending());
        assert_eq!(h.stats.discards(), 1);
        assert_eq!(h.stats.context_closes(), 1);
        assert!(h.sink.contains("Skipping active download..."));
    }

    #[tokio::test]
    async fn test_download_that_never_starts_is_a_final_failure() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).without_download();

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        match h.outcome {
            FlowOutcome::Aborted { step, .. } => assert_eq!(step, Step::FinalDownload),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(h.sink.contains("Error clicking final download"));
    }

    #[tokio::test]
    async fn test_transient_probe_error_keeps_waiting() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).with_probe_errors(target::fetch_button(), 2);

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(h
            .stats
            .clicked()
            .contains(&target::fetch_button().to_string()));
        assert!(!h.sink.contains("skipping..."));
    }

    #[tokio::test]
    async fn test_transient_probe_error_counts_as_play_attempt() {
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).with_probe_errors(target::play_control(), 1);

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(h.sink.contains("Clicked play button to load download page..."));
    }

    #[tokio::test]
    async fn test_missing_consent_is_recorded_as_soft_failure() {
        let consent = STEP_FAILURES.with_label_values(&[Step::Consent.as_str()]);
        let before = consent.get();
        let context = RunContext::new();
        let script = PageScript::happy_path(1024).without_element(target::consent_button());

        let h = run_flow(script, fixtures::fast_flow(), &context).await;

        assert!(matches!(h.outcome, FlowOutcome::DownloadStarted(_)));
        assert!(consent.get() > before);
    }

    #[tokio::test]
    async fn test_skip_checkpoint_consumes_request() {
        let temp = TempDir::new().unwrap();
        let driver = MockBrowserDriver::new(temp.path().join("staging"));
        let mut session = driver.launch().await.unwrap();
        let context = RunContext::new();
        let log = RunLogger::new(Arc::new(MemorySink::new()));
        let flow = fixtures::fast_flow();
        let executor = StepExecutor::new(session.as_mut(), &context, &log, &flow);

        assert_eq!(executor.skip_checkpoint(), StepOutcome::Done);
        context.request_skip();
        assert_eq!(executor.skip_checkpoint(), StepOutcome::Skipped);
        assert_eq!(executor.skip_checkpoint(), StepOutcome::Done);
    }
}
