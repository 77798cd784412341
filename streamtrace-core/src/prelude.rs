//! Common imports for streamtrace users

pub use crate::buffer::RingBuffer;
pub use crate::config::{StreamtraceConfig, TraceConfig, TraceOptions};
pub use crate::error::{ConfigError, Error, MessageError, Result};
pub use crate::hexdump::{hexdump, payload_hexdump, ring_hexdump};
pub use crate::hooks::{ChannelRegistration, FilterHooks, FilterInstance, FilterRole, TraceFilter};
pub use crate::logging::{DiagnosticSink, LogSink, MemorySink, SinkKind, StderrSink};
pub use crate::message::{
    Block, HttpMessage, LegacyMessage, MessageRepresentation, MessageView, StructuredMessage,
};
pub use crate::pipeline::{Pipeline, TransferReport};
pub use crate::simulator::{PartialIoSimulator, RescanBound, Verdict};
pub use crate::stream::{AnalyzerMask, AnalyzerPhase, Channel, Direction, Proxy, ProxyMode, Stream};
