//! The host collaborator interface
//!
//! One method per pipeline event. Every method has a neutral default, so a
//! filter only overrides the events it cares about.

use crate::config::TraceConfig;
use crate::message::HttpMessage;
use crate::simulator::Verdict;
use crate::stream::{AnalyzerMask, AnalyzerPhase, Channel, Proxy, Stream};
use std::fmt;
use std::sync::Arc;

/// Which side of the pipeline a filter instance sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    Frontend,
    Backend,
}

impl FilterRole {
    pub fn label(self) -> &'static str {
        match self {
            FilterRole::Frontend => "frontend",
            FilterRole::Backend => "backend",
        }
    }
}

impl fmt::Display for FilterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// A filter attached to one stream
#[derive(Debug, Clone)]
pub struct FilterInstance {
    config: Arc<TraceConfig>,
    role: FilterRole,
}

impl FilterInstance {
    pub fn new(config: Arc<TraceConfig>, role: FilterRole) -> Self {
        Self { config, role }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn role(&self) -> FilterRole {
        self.role
    }
}

/// What a filter asks for when a channel starts being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRegistration {
    /// Phases before which the filter wants a callback
    pub pre_analyzers: AnalyzerMask,
    /// Phases after which the filter wants a callback
    pub post_analyzers: AnalyzerMask,
    /// Whether the filter takes part in the data path of the channel
    pub data_filter: bool,
}

impl Default for ChannelRegistration {
    fn default() -> Self {
        Self {
            pre_analyzers: AnalyzerMask::NONE,
            post_analyzers: AnalyzerMask::NONE,
            data_filter: false,
        }
    }
}

/// Body bytes a message parser may still consume from its channel
///
/// `min(chunk_len + parsed, total) - next`, never negative.
pub fn body_available(chn: &Channel, msg: &HttpMessage) -> usize {
    let chunk = usize::try_from(msg.chunk_len).unwrap_or(usize::MAX);
    chunk.saturating_add(msg.parsed).min(chn.total()).saturating_sub(chn.next())
}

/// Pipeline events a filter can observe
///
/// Lifecycle events run once per declaration (or per worker); the others run
/// in the context of one stream. Data-path events return a [`Verdict`]; a
/// verdict with `reschedule` set means the host must wake the stream again.
#[allow(unused_variables)]
pub trait FilterHooks: Send + Sync {
    fn init(&self, conf: &TraceConfig) -> crate::Result<()> {
        Ok(())
    }

    fn deinit(&self, conf: &TraceConfig) {}

    fn check(&self, conf: &TraceConfig) -> crate::Result<()> {
        Ok(())
    }

    fn init_per_worker(&self, conf: &TraceConfig, worker: usize) -> crate::Result<()> {
        Ok(())
    }

    fn deinit_per_worker(&self, conf: &TraceConfig, worker: usize) {}

    /// Returns `false` to decline the stream
    fn attach(&self, filter: &FilterInstance, strm: &Stream) -> bool {
        true
    }

    fn detach(&self, filter: &FilterInstance, strm: &Stream) {}

    fn stream_start(&self, filter: &FilterInstance, strm: &Stream) {}

    fn stream_set_backend(&self, filter: &FilterInstance, strm: &Stream, backend: &Proxy) {}

    fn stream_stop(&self, filter: &FilterInstance, strm: &Stream) {}

    fn check_timeouts(&self, filter: &FilterInstance, strm: &Stream) {}

    fn channel_start_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
    ) -> ChannelRegistration {
        ChannelRegistration::default()
    }

    fn channel_pre_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        phase: AnalyzerPhase,
    ) {
    }

    fn channel_post_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        phase: AnalyzerPhase,
    ) {
    }

    fn channel_end_analyze(&self, filter: &FilterInstance, strm: &Stream, chn: &Channel) {}

    fn message_headers(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {}

    /// Structured payload `[offset, offset + len)` is ready; returns how much to forward
    fn message_payload_available(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
        offset: usize,
        len: usize,
    ) -> Verdict {
        Verdict::full(len)
    }

    /// Legacy body bytes are ready; returns how much to consume
    fn message_body_available(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
    ) -> Verdict {
        Verdict::full(body_available(strm.channel(msg.direction), msg))
    }

    fn message_trailers(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {}

    fn message_end(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {}

    fn message_reset(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {}

    fn message_error_reply(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        status: u16,
        body: &[u8],
    ) {
    }

    /// `len` inspected bytes may leave the channel; returns how many to forward
    fn message_forward(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
        len: usize,
    ) -> Verdict {
        Verdict::full(len)
    }

    /// Raw bytes are ready; returns how many to consume
    fn raw_data_available(&self, filter: &FilterInstance, strm: &Stream, chn: &Channel) -> Verdict {
        Verdict::full(chn.unparsed())
    }

    fn raw_forward(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        len: usize,
    ) -> Verdict {
        Verdict::full(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StructuredMessage;
    use crate::stream::{Direction, ProxyMode};

    struct Silent;
    impl FilterHooks for Silent {}

    fn instance() -> FilterInstance {
        let conf = TraceConfig::new(Default::default(), "fe");
        FilterInstance::new(Arc::new(conf), FilterRole::Frontend)
    }

    #[test]
    fn test_defaults_are_neutral() {
        let filter = instance();
        let mut strm = Stream::new(1, Proxy::new("fe", ProxyMode::Tcp), false, 32);
        strm.req.receive(b"hello");
        strm.req.advance_next(2);

        let hooks = Silent;
        assert!(hooks.attach(&filter, &strm));
        assert_eq!(
            hooks.channel_start_analyze(&filter, &strm, &strm.req),
            ChannelRegistration::default()
        );
        assert_eq!(hooks.raw_data_available(&filter, &strm, &strm.req), Verdict::full(3));
        assert_eq!(hooks.raw_forward(&filter, &strm, &strm.req, 2), Verdict::full(2));
        assert!(hooks.init(filter.config()).is_ok());
    }

    #[test]
    fn test_body_available() {
        let mut chn = Channel::new(Direction::Request, 64);
        chn.receive(&[0u8; 20]);
        chn.advance_next(5);

        let mut msg = HttpMessage::new(Direction::Request, StructuredMessage::new());
        msg.parsed = 5;
        msg.chunk_len = 8;
        assert_eq!(body_available(&chn, &msg), 8);

        msg.chunk_len = 100;
        assert_eq!(body_available(&chn, &msg), 15);

        // Parser lagging behind the inspected boundary
        msg.parsed = 0;
        msg.chunk_len = 3;
        assert_eq!(body_available(&chn, &msg), 0);

        msg.chunk_len = u64::MAX;
        assert_eq!(body_available(&chn, &msg), 15);
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(FilterRole::Frontend.to_string(), "frontend");
        assert_eq!(format!("{:<9}|", FilterRole::Backend), "backend  |");
    }
}
