use std::fmt;

use crate::browser::PendingDownload;

/// The named steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Consent,
    SubmitLink,
    Fetch,
    Play,
    FinalDownload,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consent => "consent",
            Self::SubmitLink => "submit_link",
            Self::Fetch => "fetch",
            Self::Play => "play",
            Self::FinalDownload => "final_download",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did what it set out to do.
    Done,
    /// An optional element was absent; the flow continues.
    Soft(String),
    /// A mandatory element was absent; the link is abandoned.
    Abort(String),
    /// A skip request was honoured.
    Skipped,
}

/// Result of the whole sequence for one link.
pub enum FlowOutcome {
    /// The final click started a transfer that the caller must capture.
    DownloadStarted(Box<dyn PendingDownload>),
    /// A mandatory step failed; nothing was downloaded.
    Aborted { step: Step, reason: String },
    /// The user skipped the link.
    Skipped,
}

impl fmt::Debug for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadStarted(download) => f
                .debug_tuple("DownloadStarted")
                .field(&download.suggested_filename())
                .finish(),
            Self::Aborted { step, reason } => f
                .debug_struct("Aborted")
                .field("step", step)
                .field("reason", reason)
                .finish(),
            Self::Skipped => f.write_str("Skipped"),
        }
    }
}
