//! One-shot foreground mode: process a links file and exit.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use teradl_core::{LogEvent, LogSink, PipelineController, RunSummary};

/// Log sink that prints each line to stdout.
pub fn stdout_sink() -> Arc<dyn LogSink> {
    Arc::new(|event: LogEvent| println!("{}", event.line()))
}

/// Runs every link in `links_path`, printing log lines as they happen.
///
/// Ctrl+C requests a stop: the current link finishes, the rest are not
/// attempted.
pub async fn run_once(controller: Arc<PipelineController>, links_path: &Path) -> Result<RunSummary> {
    let stopper = Arc::clone(&controller);
    let ctrl_c = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping after the current link");
                stopper.request_stop();
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    let result = controller
        .run(links_path, stdout_sink())
        .await
        .with_context(|| format!("Failed to process {}", links_path.display()));
    ctrl_c.abort();

    let summary = result?;
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        stopped_early = summary.stopped_early,
        "Run complete"
    );
    Ok(summary)
}
