use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How one link ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Saved,
    /// Skipped by the user, rejected by the size ceiling, or abandoned
    /// because a mandatory control was missing.
    Skipped,
    /// An unexpected error ended the link.
    Failed,
}

impl LinkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Links in the file, including those never attempted.
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// A stop request ended the run before every link was attempted.
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            total,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            stopped_early: false,
        }
    }

    pub fn record(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Saved => self.succeeded += 1,
            LinkOutcome::Skipped => self.skipped += 1,
            LinkOutcome::Failed => self.failed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Snapshot of a controller for status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub running: bool,
    pub stop_requested: bool,
    pub skip_pending: bool,
    pub last_summary: Option<RunSummary>,
}
