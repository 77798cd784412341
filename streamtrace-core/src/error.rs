//! Error types for streamtrace
//!
//! Only configuration and message construction can fail. Data-path hooks
//! clamp their counts instead of returning errors.

/// Errors raised while building a trace filter configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("'{keyword}' : '{option}' option without value")]
    MissingValue { keyword: String, option: String },
    #[error("'{keyword}' : unknown option '{option}'")]
    UnknownOption { keyword: String, option: String },
    #[error("expected 'trace' filter keyword, found '{0}'")]
    NotTraceKeyword(String),
    #[error("empty filter declaration")]
    EmptyDeclaration,
    #[error("invalid rescan bound '{0}' (expected 'proposed' or 'requested')")]
    InvalidRescanBound(String),
}

/// Errors raised while building a message representation
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("message head is incomplete: no empty line after the headers")]
    Incomplete,
    #[error("empty start line")]
    EmptyStartLine,
    #[error("header index entry {index} points outside the message ({pos} > {len})")]
    HeaderIndexOutOfRange { index: usize, pos: usize, len: usize },
    #[error("header index loops back on entry {0}")]
    HeaderIndexCycle(usize),
}

/// Main error type for streamtrace
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

pub type Result<T> = std::result::Result<T, Error>;
