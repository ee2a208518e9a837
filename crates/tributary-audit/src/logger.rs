//! OutputLog - per-run record of remote calls and reconciler decisions
//!
//! Every call made through the sync engine's executor appends exactly one
//! line here, success or failure. The log lives in memory for the duration of
//! a run and is written into the content archive when the run closes.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reason::ReasonCode;

/// Severity of an output log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// One timestamped line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.message
        )
    }
}

/// In-memory output log shared by everything in a run.
///
/// Lines are never dropped; a poisoned lock is recovered rather than
/// propagated so logging can never fail a run.
#[derive(Debug, Default)]
pub struct OutputLog {
    lines: Mutex<Vec<LogLine>>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let line = LogLine {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };
        self.lock().push(line);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    // ========================================================================
    // Remote calls
    // ========================================================================

    /// Log a successful call against an instance.
    pub fn call_succeeded(&self, function: &str, role: &str, host: &str, target: &str) {
        self.record(
            LogLevel::Debug,
            format!("{function} on {role} ({host}) succeeded for '{target}'"),
        );
    }

    /// Log a failed call against an instance.
    pub fn call_failed(
        &self,
        function: &str,
        role: &str,
        host: &str,
        target: &str,
        reason: ReasonCode,
        message: &str,
    ) {
        self.record(
            LogLevel::Error,
            format!("{function} on {role} ({host}) failed for '{target}' [{reason}]: {message}"),
        );
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of every line
    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of lines at `Error` level
    pub fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|l| l.level == LogLevel::Error)
            .count()
    }

    /// Lines containing `needle`; used by tests and the CLI summary
    pub fn matching(&self, needle: &str) -> Vec<LogLine> {
        self.lock()
            .iter()
            .filter(|l| l.message.contains(needle))
            .cloned()
            .collect()
    }

    /// Whole log as text, one line per entry
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lock().iter() {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogLine>> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
