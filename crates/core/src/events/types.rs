use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic category of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    /// Leading marker used when the event carries no step-specific icon.
    ///
    /// Warning, error and success lines always use these markers so that a
    /// renderer can color by marker alone.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Error => "❌",
            Self::Success => "✅",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// One line of the run's log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Position within the run, starting at 0.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub icon: String,
    pub message: String,
    /// Section headers are rendered boxed.
    #[serde(default)]
    pub header: bool,
}

impl LogEvent {
    pub fn new(seq: u64, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            level,
            icon: level.marker().to_string(),
            message: message.into(),
            header: false,
        }
    }

    /// Replace the marker of an info line with a step-specific icon.
    /// Other levels keep their category marker.
    pub fn with_icon(mut self, icon: &str) -> Self {
        if self.level == LogLevel::Info {
            self.icon = icon.to_string();
        }
        self
    }

    pub fn as_header(mut self) -> Self {
        self.header = true;
        self
    }

    /// Render as a single (possibly multi-line) text line.
    pub fn line(&self) -> String {
        let text = format!("{} {}", self.icon, self.message);
        if !self.header {
            return text;
        }
        let rule = "═".repeat(text.chars().count() + 4);
        format!("\n{rule}\n  {text}\n{rule}")
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}
