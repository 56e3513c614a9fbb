//! UI step executor.
//!
//! Drives the target page through its fixed interaction sequence:
//!
//! 1. dismiss the consent dialog (best-effort)
//! 2. paste the link (primary input, then a generic fallback)
//! 3. click the fetch/stream control (mandatory)
//! 4. click the play control, probed repeatedly (two-stage flow only)
//! 5. click the final download control and capture the transfer start
//!
//! Each step has its own timeout and its own policy for a missing element.
//! Skip requests are honoured around the final click.

mod executor;
pub mod target;
mod types;

pub use executor::StepExecutor;
pub use types::{FlowOutcome, Step, StepOutcome};
