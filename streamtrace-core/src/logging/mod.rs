//! Diagnostic output and operational logging
//!
//! Trace lines are plain text appended to a [`DiagnosticSink`]. The crate's
//! own operational messages (configuration loaded, replay cut short) go
//! through the standard `log` macros, backed by `env_logger` once
//! [`init_logging`] has run.

pub mod formatter;

pub use formatter::TraceLine;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// `log` target used by [`LogSink`]
pub const TRACE_TARGET: &str = "streamtrace::trace";

/// Install `env_logger`, defaulting to `level` when `RUST_LOG` is unset
///
/// Safe to call more than once; later calls leave the first logger in place.
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

/// Append-only, line-oriented output for trace lines
pub trait DiagnosticSink: Send + Sync {
    /// Append one line; `line` carries no terminator
    fn append_line(&self, line: &str);
}

/// Writes each line to standard error
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn append_line(&self, line: &str) {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines appended so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn append_line(&self, line: &str) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line.to_string());
    }
}

/// Forwards lines to the `log` facade at info level under [`TRACE_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn append_line(&self, line: &str) {
        log::info!(target: TRACE_TARGET, "{}", line);
    }
}

/// Configurable sink selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stderr,
    Log,
}

impl SinkKind {
    pub fn build(self) -> Arc<dyn DiagnosticSink> {
        match self {
            SinkKind::Stderr => Arc::new(StderrSink),
            SinkKind::Log => Arc::new(LogSink),
        }
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" => Ok(SinkKind::Stderr),
            "log" => Ok(SinkKind::Log),
            other => Err(format!("unknown sink '{}' (expected 'stderr' or 'log')", other)),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SinkKind::Stderr => "stderr",
            SinkKind::Log => "log",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.append_line("first");
        sink.append_line("second");
        assert_eq!(sink.lines(), vec!["first", "second"]);
        sink.clear();
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_shared_sink() {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<dyn DiagnosticSink> = sink.clone();
        shared.append_line("via trait object");
        assert_eq!(sink.lines(), vec!["via trait object"]);
    }

    #[test]
    fn test_sink_kind_parsing() {
        assert_eq!("STDERR".parse::<SinkKind>().unwrap(), SinkKind::Stderr);
        assert_eq!("log".parse::<SinkKind>().unwrap(), SinkKind::Log);
        assert!("syslog".parse::<SinkKind>().is_err());
        assert_eq!(SinkKind::Log.to_string(), "log");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("warn");
        init_logging("debug");
        log::debug!("still fine");
    }
}
