//! Sequential link-processing pipeline.
//!
//! One link at a time: open a session, run the step sequence, capture the
//! download, close the session. Cooperative stop/skip signals live in a
//! run-scoped [`RunContext`].

mod context;
mod controller;
mod error;
mod types;

pub use context::RunContext;
pub use controller::PipelineController;
pub use error::PipelineError;
pub use types::{LinkOutcome, RunStatus, RunSummary};
