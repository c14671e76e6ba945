//! Structured log events for user-facing collectors.
//!
//! Library code logs through `tracing`. Events that a host UI wants to show
//! (training started, model saved, training failed) are additionally sent to a
//! [`LogSink`] as [`LogEvent`]s.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Progress information.
    Info,
    /// Recoverable problem.
    Warning,
    /// Operation failed.
    Error,
    /// Operation completed.
    Success,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        };
        f.write_str(s)
    }
}

/// A single structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl LogEvent {
    /// Creates an event stamped with the current wall-clock time.
    #[must_use]
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        Self {
            level,
            message: message.into(),
            timestamp,
        }
    }

    /// Creates an info event.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::now(LogLevel::Info, message)
    }

    /// Creates a warning event.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::now(LogLevel::Warning, message)
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::now(LogLevel::Error, message)
    }

    /// Creates a success event.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::now(LogLevel::Success, message)
    }
}

/// Receiver of [`LogEvent`]s.
pub trait LogSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: LogEvent);
}

/// Forwards events to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        match event.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(kind = %event.level, "{}", event.message);
            }
            LogLevel::Warning => tracing::warn!("{}", event.message),
            LogLevel::Error => tracing::error!("{}", event.message),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns `true` if any recorded event has `level`.
    #[must_use]
    pub fn contains_level(&self, level: LogLevel) -> bool {
        self.events.lock().iter().any(|e| e.level == level)
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        self.events.lock().push(event);
    }
}
