//! Trace filter configuration
//!
//! A filter is declared with the keyword form
//!
//! ```text
//! trace [name <string>] [random-parsing] [random-forwarding] [hexdump]
//! ```
//!
//! or through the `[trace]` section of a TOML file, which accepts the same
//! options plus `rescan-bound`.

use crate::error::ConfigError;
use crate::simulator::RescanBound;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Keyword introducing a trace filter declaration
pub const TRACE_KEYWORD: &str = "trace";

/// Display name used when the declaration carries no `name`
pub const DEFAULT_TRACE_NAME: &str = "TRACE";

/// Options of one trace filter declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TraceOptions {
    /// Name shown in every trace line
    /// Env: ST_TRACE_NAME
    pub name: Option<String>,

    /// Consume a random share of the available data
    /// Env: ST_TRACE_RANDOM_PARSING
    pub random_parsing: bool,

    /// Forward a random share of the requested data
    /// Env: ST_TRACE_RANDOM_FORWARDING
    pub random_forwarding: bool,

    /// Dump forwarded bytes in hex
    /// Env: ST_TRACE_HEXDUMP
    pub hexdump: bool,

    /// How far the forward cap rescans the payload
    /// Env: ST_TRACE_RESCAN_BOUND
    /// Default: proposed
    pub rescan_bound: RescanBound,
}

impl TraceOptions {
    /// Parse a tokenized declaration; `args[0]` must be the `trace` keyword
    pub fn parse(args: &[&str]) -> Result<Self, ConfigError> {
        let (keyword, options) = args.split_first().ok_or(ConfigError::EmptyDeclaration)?;
        if *keyword != TRACE_KEYWORD {
            return Err(ConfigError::NotTraceKeyword((*keyword).to_string()));
        }

        let mut parsed = Self::default();
        let mut tokens = options.iter();
        while let Some(token) = tokens.next() {
            match *token {
                "name" => {
                    let value = tokens.next().filter(|v| !v.is_empty()).ok_or_else(|| {
                        ConfigError::MissingValue {
                            keyword: TRACE_KEYWORD.to_string(),
                            option: "name".to_string(),
                        }
                    })?;
                    parsed.name = Some((*value).to_string());
                }
                "random-parsing" => parsed.random_parsing = true,
                "random-forwarding" => parsed.random_forwarding = true,
                "hexdump" => parsed.hexdump = true,
                other => {
                    return Err(ConfigError::UnknownOption {
                        keyword: TRACE_KEYWORD.to_string(),
                        option: other.to_string(),
                    })
                }
            }
        }
        Ok(parsed)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    pub(crate) fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("ST_TRACE_NAME") {
            self.name = Some(name);
        }

        if let Some(flag) = lookup("ST_TRACE_RANDOM_PARSING") {
            self.random_parsing = parse_flag(&flag);
        }

        if let Some(flag) = lookup("ST_TRACE_RANDOM_FORWARDING") {
            self.random_forwarding = parse_flag(&flag);
        }

        if let Some(flag) = lookup("ST_TRACE_HEXDUMP") {
            self.hexdump = parse_flag(&flag);
        }

        if let Some(bound) = lookup("ST_TRACE_RESCAN_BOUND") {
            match bound.parse() {
                Ok(bound) => self.rescan_bound = bound,
                Err(e) => log::warn!("Ignoring ST_TRACE_RESCAN_BOUND: {}", e),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.is_empty() {
                bail!("Invalid trace name: name cannot be empty");
            }
            if name.chars().any(char::is_whitespace) {
                bail!("Invalid trace name '{}': name cannot contain whitespace", name);
            }
        }
        Ok(())
    }
}

impl FromStr for TraceOptions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let args: Vec<&str> = s.split_whitespace().collect();
        Self::parse(&args)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Immutable configuration shared by every stream using one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    display_name: String,
    options: TraceOptions,
}

impl TraceConfig {
    /// Bind a declaration to the proxy it is declared on
    pub fn new(options: TraceOptions, proxy: &str) -> Self {
        let name = options.name.as_deref().unwrap_or(DEFAULT_TRACE_NAME);
        Self { display_name: format!("{}/{}", name, proxy), options }
    }

    /// `<name>/<proxy>`
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn options(&self) -> &TraceOptions {
        &self.options
    }
}
