//! Configuration for streamtrace
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Environment variables** (`ST_*`)
//! 2. **Config file** (TOML, `[trace]` and `[logging]` sections)
//! 3. **Defaults**
//!
//! A filter declaration given on the command line replaces the `[trace]`
//! section as a whole.
//!
//! # Example
//!
//! ```toml
//! [trace]
//! name = "demo"
//! hexdump = true
//! random-forwarding = true
//! rescan-bound = "requested"
//!
//! [logging]
//! level = "debug"
//! sink = "stderr"
//! ```

pub mod logging;
pub mod trace;

pub use logging::LoggingConfig;
pub use trace::{TraceConfig, TraceOptions, DEFAULT_TRACE_NAME, TRACE_KEYWORD};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete streamtrace configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamtraceConfig {
    pub trace: TraceOptions,
    pub logging: LoggingConfig,
}

impl StreamtraceConfig {
    /// Load configuration with full supersedence chain
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
            log::debug!("Loaded configuration from {}", path.display());
        }

        config.apply_env_vars();

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.trace.merge(other.trace);
        self.logging.merge(other.logging);
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.trace.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.trace.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
