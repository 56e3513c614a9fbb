//! Run control API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use teradl_core::{LogSink, PipelineError, RunStatus};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to start a run
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    /// Path to a text file with one link per line.
    pub links_path: PathBuf,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<RunErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(RunErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Current run state and the totals of the last finished run
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    Json(state.controller().status().await)
}

/// Start a run in the background
///
/// Returns 202 once the run is scheduled. Progress is streamed over the
/// WebSocket; the totals appear in `GET /run` when it finishes.
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let controller = Arc::clone(state.controller());
    if controller.is_running() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "A run is already in progress",
        ));
    }

    if !tokio::fs::metadata(&request.links_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Links file not found: {}", request.links_path.display()),
        ));
    }

    let broadcaster = state.ws_broadcaster().clone();
    let sink: Arc<dyn LogSink> = Arc::new(broadcaster.clone());
    let links_path = request.links_path.clone();

    info!(path = %links_path.display(), "Starting run");
    let task = tokio::spawn(async move {
        match controller.run(&links_path, sink).await {
            Ok(summary) => broadcaster.run_finished(summary),
            Err(PipelineError::AlreadyRunning) => {
                warn!("Run rejected, another run started first");
            }
            Err(e) => error!("Run failed: {}", e),
        }
    });
    state.track_run(task).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: format!("Run started for {}", request.links_path.display()),
        }),
    ))
}

/// Stop the active run before its next link
pub async fn stop_run(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.controller().request_stop();
    Json(MessageResponse {
        message: "Stop requested".to_string(),
    })
}

/// Skip the link currently being processed
pub async fn skip_run(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.controller().request_skip();
    Json(MessageResponse {
        message: "Skip requested".to_string(),
    })
}
