//! Leveled logger shared by the pipeline components.
//!
//! Every record is forwarded to `tracing` and appended to a bounded history so
//! a crash view can show what led up to a critical failure. The history is
//! owned by the logger instance; there is no process-wide buffer.

use crate::runtime::fatal::{CrashReport, FatalErrorHandler};
use anyhow::anyhow;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

pub const DEFAULT_HISTORY_CAPACITY: usize = 512;

const CRASH_LINE: &str = "[CRASH] Mirror has stopped working.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Logger {
    history: Mutex<VecDeque<String>>,
    capacity: usize,
    fatal: FatalErrorHandler,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("capacity", &self.capacity)
            .field("fatal", &self.fatal)
            .finish()
    }
}

impl Logger {
    pub fn new(capacity: usize, fatal: FatalErrorHandler) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            fatal,
        }
    }

    pub fn log(&self, level: LogLevel, message: &str, detail: Option<&Value>) {
        match (level, detail) {
            (LogLevel::Debug, Some(detail)) => tracing::debug!(%detail, "{message}"),
            (LogLevel::Debug, None) => tracing::debug!("{message}"),
            (LogLevel::Info, Some(detail)) => tracing::info!(%detail, "{message}"),
            (LogLevel::Info, None) => tracing::info!("{message}"),
            (LogLevel::Warn, Some(detail)) => tracing::warn!(%detail, "{message}"),
            (LogLevel::Warn, None) => tracing::warn!("{message}"),
            (LogLevel::Critical, Some(detail)) => {
                tracing::error!(critical = true, %detail, "{message}")
            }
            (LogLevel::Critical, None) => tracing::error!(critical = true, "{message}"),
        }

        let time = chrono::Local::now().format("%H:%M:%S%.3f");
        self.push(format!("{time} [{level}] {message}"));
        if let Some(detail) = detail {
            self.push(detail.to_string());
        }

        if level == LogLevel::Critical {
            self.push(format!("{time} {CRASH_LINE}"));
            tracing::warn!("{CRASH_LINE}");
            self.fatal.trigger(anyhow!("{message}"), self.history());
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    /// Logs a terminal failure; the pipeline must not advance afterwards.
    pub fn critical(&self, message: &str, detail: Option<&Value>) {
        self.log(LogLevel::Critical, message, detail);
    }

    /// Snapshot of the retained history, oldest line first.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn crash_report(&self) -> Option<CrashReport> {
        self.fatal.crash_report()
    }

    fn push(&self, line: String) {
        let mut history = self.history.lock().unwrap_or_else(|err| err.into_inner());
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(line);
    }
}
