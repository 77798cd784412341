//! Logging configuration

use crate::logging::SinkKind;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Operational log level, as understood by env_logger
    /// Env: ST_LOG_LEVEL
    /// Default: "info"
    pub level: String,

    /// Where trace lines go
    /// Env: ST_LOG_SINK
    /// Default: stderr
    pub sink: SinkKind,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), sink: SinkKind::Stderr }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    pub(crate) fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("ST_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(sink) = lookup("ST_LOG_SINK") {
            match sink.parse() {
                Ok(sink) => self.sink = sink,
                Err(e) => log::warn!("Ignoring ST_LOG_SINK: {}", e),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.parse::<log::LevelFilter>().is_err() {
            bail!(
                "Invalid log level '{}': expected off, error, warn, info, debug or trace",
                self.level
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_validation() {
        assert!(LoggingConfig::default().validate().is_ok());
        let cfg = LoggingConfig { level: "chatty".to_string(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_env_sink() {
        let mut cfg = LoggingConfig::default();
        cfg.apply_vars(|key| (key == "ST_LOG_SINK").then(|| "log".to_string()));
        assert_eq!(cfg.sink, SinkKind::Log);
        cfg.apply_vars(|key| (key == "ST_LOG_SINK").then(|| "pigeon".to_string()));
        assert_eq!(cfg.sink, SinkKind::Log);
    }
}
