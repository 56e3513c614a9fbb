//! User-facing log stream.
//!
//! The pipeline reports progress as an ordered sequence of [`LogEvent`]s sent
//! to an injected [`LogSink`]. The core never reads events back; rendering and
//! transport belong to the caller (stdout in CLI mode, WebSocket in server
//! mode).

mod logger;
mod sink;
mod types;

pub use logger::RunLogger;
pub use sink::{LogHandle, LogSink, MemorySink, NullSink};
pub use types::{LogEvent, LogLevel};
