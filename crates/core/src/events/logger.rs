use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{LogEvent, LogLevel, LogSink};

/// Per-run emitter: stamps sequence numbers, forwards to the sink and
/// mirrors every line to `tracing`.
pub struct RunLogger {
    sink: Arc<dyn LogSink>,
    next_seq: AtomicU64,
}

impl RunLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn info(&self, icon: &str, message: impl Into<String>) {
        let event = self.event(LogLevel::Info, message).with_icon(icon);
        self.send(event);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let event = self.event(LogLevel::Warning, message);
        self.send(event);
    }

    pub fn error(&self, message: impl Into<String>) {
        let event = self.event(LogLevel::Error, message);
        self.send(event);
    }

    pub fn success(&self, message: impl Into<String>) {
        let event = self.event(LogLevel::Success, message);
        self.send(event);
    }

    pub fn header(&self, level: LogLevel, icon: &str, title: impl Into<String>) {
        let event = self.event(level, title).with_icon(icon).as_header();
        self.send(event);
    }

    fn event(&self, level: LogLevel, message: impl Into<String>) -> LogEvent {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        LogEvent::new(seq, level, message)
    }

    fn send(&self, event: LogEvent) {
        match event.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(seq = event.seq, "{}", event.message)
            }
            LogLevel::Warning => tracing::warn!(seq = event.seq, "{}", event.message),
            LogLevel::Error => tracing::error!(seq = event.seq, "{}", event.message),
        }
        self.sink.emit(event);
    }
}
