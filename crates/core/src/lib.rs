pub mod browser;
pub mod capture;
pub mod config;
pub mod events;
pub mod links;
pub mod metrics;
pub mod pipeline;
pub mod steps;
pub mod testing;

pub use browser::{
    BrowserDriver, BrowserSession, ChromiumDriver, LaunchOptions, PendingDownload, Selector,
    SessionDriver, SessionError,
};
pub use capture::{CaptureError, CaptureOutcome, DownloadCapture, SizeCeiling};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config,
    ConfigError, FlowVariant, SanitizedConfig,
};
pub use events::{LogEvent, LogHandle, LogLevel, LogSink, MemorySink, NullSink, RunLogger};
pub use links::{parse_links, read_links, Link};
pub use pipeline::{
    LinkOutcome, PipelineController, PipelineError, RunContext, RunStatus, RunSummary,
};
pub use steps::{FlowOutcome, Step, StepExecutor, StepOutcome};
