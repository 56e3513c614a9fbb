use std::sync::Arc;
use teradl_core::{Config, PipelineController, SanitizedConfig};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    controller: Arc<PipelineController>,
    ws_broadcaster: WsBroadcaster,
    run_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        controller: Arc<PipelineController>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            controller,
            ws_broadcaster,
            run_task: Mutex::new(None),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn controller(&self) -> &Arc<PipelineController> {
        &self.controller
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Remembers the task driving the current run.
    pub async fn track_run(&self, task: JoinHandle<()>) {
        *self.run_task.lock().await = Some(task);
    }

    /// Stops the active run after its current link and waits for it to
    /// finish, so its browser session is closed before the process exits.
    pub async fn finish_run(&self) {
        let Some(task) = self.run_task.lock().await.take() else {
            return;
        };
        if !task.is_finished() {
            self.controller.request_stop();
        }
        if let Err(e) = task.await {
            warn!("Run task ended abnormally: {}", e);
        }
    }
}
