use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::LogEvent;

/// Destination for the run's log stream.
///
/// Emission never blocks and never fails the caller: a sink that cannot
/// deliver an event drops it.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

impl<F> LogSink for F
where
    F: Fn(LogEvent) + Send + Sync,
{
    fn emit(&self, event: LogEvent) {
        self(event)
    }
}

/// Channel-backed sink handle.
///
/// Cheaply cloneable; the receiving half is owned by whoever renders the
/// stream.
#[derive(Debug, Clone)]
pub struct LogHandle {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl LogHandle {
    pub fn new(tx: mpsc::UnboundedSender<LogEvent>) -> Self {
        Self { tx }
    }

    /// Create a handle together with its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl LogSink for LogHandle {
    fn emit(&self, event: LogEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Log receiver dropped, discarding event");
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Rendered lines, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(LogEvent::line).collect()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.message.contains(needle))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        self.lock().push(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _event: LogEvent) {}
}
