//! Streamtrace - Core
//!
//! A trace filter for streaming request/response pipelines.
//!
//! # Overview
//!
//! The filter attaches to every stage of a proxy-style data path carrying TCP
//! or HTTP traffic. It logs each pipeline transition with enough context to
//! rebuild the timeline of a stream, and it can deliberately take less data
//! than offered so the host's partial I/O and backpressure handling run.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use streamtrace_core::prelude::*;
//! use std::sync::Arc;
//!
//! let options: TraceOptions = "trace name demo hexdump".parse()?;
//! let config = Arc::new(TraceConfig::new(options, "fe_main"));
//! let filter = FilterInstance::new(config, FilterRole::Frontend);
//! let stream = Stream::new(1, Proxy::new("fe_main", ProxyMode::Tcp), false, 16 * 1024);
//!
//! let mut pipeline = Pipeline::new(TraceFilter::default(), filter, stream);
//! pipeline.open();
//! pipeline.replay_tcp(Direction::Request, b"hello");
//! pipeline.close();
//! ```
//!
//! # Architecture
//!
//! - [`message`] - Read-only views over structured and legacy message bodies
//! - [`simulator`] - Randomized consume/forward decisions
//! - [`hexdump`] - Hex+ASCII rendering of byte windows, ring buffers included
//! - [`hooks`] - The pipeline event interface and the trace filter
//! - [`pipeline`] - A minimal host driving one stream through the hooks
//! - [`config`] - Filter declarations and TOML/env configuration
//! - [`logging`] - Diagnostic sinks and `env_logger` setup

pub mod buffer;
pub mod config;
pub mod error;
pub mod hexdump;
pub mod hooks;
pub mod logging;
pub mod message;
pub mod pipeline;
pub mod simulator;
pub mod stream;

pub mod prelude;

pub use error::{ConfigError, Error, MessageError, Result};
pub use hooks::{FilterHooks, TraceFilter};
pub use pipeline::Pipeline;
