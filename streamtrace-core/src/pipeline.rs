//! A minimal host pipeline
//!
//! Drives one stream through a [`FilterHooks`] implementation in the order a
//! proxy would: attach, start, per-channel analysis with its phases, headers,
//! the body loops, end of analysis, stop and detach. Every verdict carrying a
//! reschedule request is counted once.

use crate::hooks::{body_available, ChannelRegistration, FilterHooks, FilterInstance, TraceFilter};
use crate::message::{Block, HttpMessage, MessageRepresentation, MessageView};
use crate::simulator::Verdict;
use crate::stream::{AnalyzerMask, AnalyzerPhase, Direction, PipelineMode, Proxy, Stream};

/// Upper bound on body loop rounds per channel
pub const DEFAULT_MAX_ROUNDS: usize = 10_000;

const TCP_REQUEST: &[AnalyzerPhase] = &[
    AnalyzerPhase::ReqInspectFrontend,
    AnalyzerPhase::ReqSwitchingRules,
    AnalyzerPhase::ReqInspectBackend,
    AnalyzerPhase::ReqServerRules,
];

const TCP_RESPONSE: &[AnalyzerPhase] = &[];

const HTTP_REQUEST: &[AnalyzerPhase] = &[
    AnalyzerPhase::ReqInspectFrontend,
    AnalyzerPhase::ReqWaitHttp,
    AnalyzerPhase::ReqHttpProcessFrontend,
    AnalyzerPhase::ReqSwitchingRules,
    AnalyzerPhase::ReqInspectBackend,
    AnalyzerPhase::ReqHttpProcessBackend,
    AnalyzerPhase::ReqServerRules,
];

const HTTP_RESPONSE: &[AnalyzerPhase] = &[
    AnalyzerPhase::ResInspect,
    AnalyzerPhase::ResWaitHttp,
    AnalyzerPhase::ResHttpProcess,
    AnalyzerPhase::ResStoreRules,
];

/// Phases run before the data flows, and the phase the data flows in
fn phases(direction: Direction, mode: PipelineMode) -> (&'static [AnalyzerPhase], AnalyzerPhase) {
    match (mode, direction) {
        (PipelineMode::Tcp, Direction::Request) => (TCP_REQUEST, AnalyzerPhase::ReqStickingRules),
        (PipelineMode::Tcp, Direction::Response) => (TCP_RESPONSE, AnalyzerPhase::ResInspect),
        (_, Direction::Request) => (HTTP_REQUEST, AnalyzerPhase::ReqHttpXferBody),
        (_, Direction::Response) => (HTTP_RESPONSE, AnalyzerPhase::ResHttpXferBody),
    }
}

/// Outcome of replaying one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub direction: Direction,
    /// Bytes taken into the channel buffer
    pub received: usize,
    /// Bytes released downstream
    pub forwarded: usize,
    pub rounds: usize,
    /// The round limit was hit before the channel drained
    pub exhausted: bool,
}

impl TransferReport {
    fn new(direction: Direction) -> Self {
        Self { direction, received: 0, forwarded: 0, rounds: 0, exhausted: false }
    }
}

/// One stream, one filter, and the hooks they go through
pub struct Pipeline<H: FilterHooks = TraceFilter> {
    hooks: H,
    filter: FilterInstance,
    stream: Stream,
    max_rounds: usize,
    reschedules: usize,
}

impl<H: FilterHooks> Pipeline<H> {
    pub fn new(hooks: H, filter: FilterInstance, stream: Stream) -> Self {
        Self { hooks, filter, stream, max_rounds: DEFAULT_MAX_ROUNDS, reschedules: 0 }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn filter(&self) -> &FilterInstance {
        &self.filter
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Number of times the stream asked to be woken up again
    pub fn reschedules(&self) -> usize {
        self.reschedules
    }

    fn request_reschedule(&mut self) {
        self.reschedules += 1;
        log::trace!("stream #{:x} rescheduled ({} so far)", self.stream.uniq_id, self.reschedules);
    }

    fn settle(&mut self, verdict: Verdict) -> usize {
        if verdict.reschedule {
            self.request_reschedule();
        }
        verdict.amount
    }

    /// Attach the filter and start the stream; `false` if the filter declined
    pub fn open(&mut self) -> bool {
        if !self.hooks.attach(&self.filter, &self.stream) {
            log::debug!("filter declined stream #{:x}", self.stream.uniq_id);
            return false;
        }
        self.hooks.stream_start(&self.filter, &self.stream);
        true
    }

    /// Assign the backend the stream was routed to
    pub fn route(&mut self, backend: Proxy) {
        self.hooks.stream_set_backend(&self.filter, &self.stream, &backend);
        self.stream.set_backend(backend);
    }

    pub fn expire_timers(&self) {
        self.hooks.check_timeouts(&self.filter, &self.stream);
    }

    pub fn reply_error(&self, status: u16, body: &[u8]) {
        self.hooks.message_error_reply(&self.filter, &self.stream, status, body);
    }

    pub fn reset_message(&self, msg: &HttpMessage) {
        self.hooks.message_reset(&self.filter, &self.stream, msg);
    }

    pub fn close(&mut self) {
        self.hooks.stream_stop(&self.filter, &self.stream);
        self.hooks.detach(&self.filter, &self.stream);
    }

    fn run_phase(&mut self, direction: Direction, phase: AnalyzerPhase, reg: &ChannelRegistration) {
        let strm = &self.stream;
        if reg.pre_analyzers.contains(phase) {
            self.hooks.channel_pre_analyze(&self.filter, strm, strm.channel(direction), phase);
        }
        let chn = self.stream.channel_mut(direction);
        let mut mask = chn.analyzers();
        mask.remove(phase);
        chn.set_analyzers(mask);

        let strm = &self.stream;
        if reg.post_analyzers.contains(phase) {
            self.hooks.channel_post_analyze(&self.filter, strm, strm.channel(direction), phase);
        }
    }

    /// Start analysis and run every phase before the data phase
    fn begin_analyze(&mut self, direction: Direction) -> (ChannelRegistration, AnalyzerPhase) {
        let strm = &self.stream;
        let reg = self.hooks.channel_start_analyze(&self.filter, strm, strm.channel(direction));

        let (head, data_phase) = phases(direction, self.stream.mode());
        let mask: AnalyzerMask = head.iter().copied().chain(Some(data_phase)).collect();
        self.stream.channel_mut(direction).set_analyzers(mask);

        for phase in head {
            self.run_phase(direction, *phase, &reg);
        }
        let strm = &self.stream;
        if reg.pre_analyzers.contains(data_phase) {
            self.hooks.channel_pre_analyze(&self.filter, strm, strm.channel(direction), data_phase);
        }
        (reg, data_phase)
    }

    fn finish_analyze(
        &mut self,
        direction: Direction,
        data_phase: AnalyzerPhase,
        reg: &ChannelRegistration,
    ) {
        let chn = self.stream.channel_mut(direction);
        let mut mask = chn.analyzers();
        mask.remove(data_phase);
        chn.set_analyzers(mask);

        let strm = &self.stream;
        if reg.post_analyzers.contains(data_phase) {
            let chn = strm.channel(direction);
            self.hooks.channel_post_analyze(&self.filter, strm, chn, data_phase);
        }
        self.hooks.channel_end_analyze(&self.filter, strm, strm.channel(direction));
        self.stream.channel_mut(direction).set_analyzers(AnalyzerMask::NONE);
    }

    fn exhausted(&self, report: &mut TransferReport, left: usize) {
        report.exhausted = true;
        log::warn!(
            "stream #{:x}: {} channel stopped after {} rounds with {} bytes left",
            self.stream.uniq_id,
            report.direction,
            report.rounds,
            left
        );
    }

    /// Push raw bytes through one channel
    pub fn replay_tcp(&mut self, direction: Direction, input: &[u8]) -> TransferReport {
        let (reg, data_phase) = self.begin_analyze(direction);
        let mut report = TransferReport::new(direction);
        let mut input = input;

        loop {
            let chn = self.stream.channel_mut(direction);
            let taken = chn.receive(input);
            input = &input[taken..];
            report.received += taken;
            if chn.total() == 0 && input.is_empty() {
                break;
            }
            if report.rounds == self.max_rounds {
                let left = chn.total() + input.len();
                self.exhausted(&mut report, left);
                break;
            }
            report.rounds += 1;

            let consume = if reg.data_filter {
                let strm = &self.stream;
                let chn = strm.channel(direction);
                let verdict = self.hooks.raw_data_available(&self.filter, strm, chn);
                self.settle(verdict)
            } else {
                self.stream.channel(direction).unparsed()
            };
            self.stream.channel_mut(direction).advance_next(consume);

            let len = self.stream.channel(direction).pending();
            if len == 0 {
                continue;
            }
            let amount = if reg.data_filter {
                let strm = &self.stream;
                let chn = strm.channel(direction);
                let verdict = self.hooks.raw_forward(&self.filter, strm, chn, len);
                self.settle(verdict)
            } else {
                len
            };
            let chn = self.stream.channel_mut(direction);
            report.forwarded += chn.forward(amount);
            chn.release_forwarded();
        }

        self.finish_analyze(direction, data_phase, &reg);
        report
    }

    /// Push an HTTP message through the channel of its direction
    ///
    /// Structured messages go through `message_payload_available`; legacy
    /// ones through `message_body_available` then `message_forward`.
    pub fn replay_http(&mut self, mut msg: HttpMessage) -> TransferReport {
        let direction = msg.direction;
        let (reg, data_phase) = self.begin_analyze(direction);
        self.hooks.message_headers(&self.filter, &self.stream, &msg);

        let body: Vec<u8> =
            msg.repr.slice_at(0, msg.repr.payload_len()).flatten().copied().collect();
        let structured = msg.repr.is_structured();
        let mut input = &body[..];
        let mut parsed_total = 0;
        let mut report = TransferReport::new(direction);

        loop {
            let chn = self.stream.channel_mut(direction);
            let taken = chn.receive(input);
            input = &input[taken..];
            report.received += taken;
            if chn.total() == 0 && input.is_empty() {
                break;
            }
            if report.rounds == self.max_rounds {
                let left = chn.total() + input.len();
                self.exhausted(&mut report, left);
                break;
            }
            report.rounds += 1;

            if structured {
                let chn = self.stream.channel_mut(direction);
                let unparsed = chn.unparsed();
                chn.advance_next(unparsed);
                let len = chn.pending();
                let amount = if reg.data_filter {
                    let verdict = self.hooks.message_payload_available(
                        &self.filter,
                        &self.stream,
                        &msg,
                        msg.sent,
                        len,
                    );
                    self.settle(verdict)
                } else {
                    len
                };
                let chn = self.stream.channel_mut(direction);
                let step = chn.forward(amount);
                chn.release_forwarded();
                msg.sent += step;
                report.forwarded += step;
                continue;
            }

            msg.parsed = self.stream.channel(direction).next();
            msg.chunk_len = (body.len() - parsed_total) as u64;
            let consume = if reg.data_filter {
                let verdict = self.hooks.message_body_available(&self.filter, &self.stream, &msg);
                self.settle(verdict)
            } else {
                body_available(self.stream.channel(direction), &msg)
            };
            parsed_total += self.stream.channel_mut(direction).advance_next(consume);

            let len = self.stream.channel(direction).pending();
            if len == 0 {
                continue;
            }
            let amount = if reg.data_filter {
                let verdict = self.hooks.message_forward(&self.filter, &self.stream, &msg, len);
                self.settle(verdict)
            } else {
                len
            };
            let chn = self.stream.channel_mut(direction);
            let step = chn.forward(amount);
            chn.release_forwarded();
            msg.sent += step;
            report.forwarded += step;
        }

        if has_trailers(&msg.repr) {
            self.hooks.message_trailers(&self.filter, &self.stream, &msg);
        }
        self.hooks.message_end(&self.filter, &self.stream, &msg);
        self.finish_analyze(direction, data_phase, &reg);
        report
    }
}

fn has_trailers(repr: &MessageRepresentation) -> bool {
    match repr {
        MessageRepresentation::Structured(msg) => {
            msg.blocks().iter().any(|blk| matches!(blk, Block::Trailer { .. }))
        }
        MessageRepresentation::Legacy(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TraceConfig, TraceOptions};
    use crate::hooks::FilterRole;
    use crate::logging::MemorySink;
    use crate::message::{LegacyMessage, StructuredMessage};
    use crate::simulator::PartialIoSimulator;
    use crate::stream::{Channel, ProxyMode};
    use std::sync::Arc;

    fn filter(declaration: &str) -> FilterInstance {
        let options: TraceOptions = declaration.parse().unwrap();
        FilterInstance::new(Arc::new(TraceConfig::new(options, "fe")), FilterRole::Frontend)
    }

    fn traced(
        declaration: &str,
        mode: ProxyMode,
        structured: bool,
        capacity: usize,
    ) -> (Arc<MemorySink>, Pipeline) {
        let sink = Arc::new(MemorySink::new());
        let hooks = TraceFilter::new(sink.clone(), PartialIoSimulator::seeded(2024));
        let stream = Stream::new(1, Proxy::new("fe", mode), structured, capacity);
        (sink, Pipeline::new(hooks, filter(declaration), stream))
    }

    /// Never takes anything
    struct Stubborn;

    impl FilterHooks for Stubborn {
        fn channel_start_analyze(
            &self,
            _filter: &FilterInstance,
            _strm: &Stream,
            _chn: &Channel,
        ) -> ChannelRegistration {
            ChannelRegistration { data_filter: true, ..Default::default() }
        }

        fn raw_data_available(&self, _: &FilterInstance, _: &Stream, chn: &Channel) -> Verdict {
            Verdict::new(0, chn.unparsed())
        }
    }

    #[test]
    fn test_tcp_replay_forwards_everything() {
        let (sink, mut pipeline) = traced("trace", ProxyMode::Tcp, false, 32);
        let input: Vec<u8> = (0..100u8).collect();

        assert!(pipeline.open());
        let report = pipeline.replay_tcp(Direction::Request, &input);
        pipeline.close();

        assert_eq!(report.received, 100);
        assert_eq!(report.forwarded, 100);
        assert_eq!(report.rounds, 4);
        assert!(!report.exhausted);
        assert_eq!(pipeline.reschedules(), 0);

        let lines = sink.lines();
        assert!(lines[0].contains("attach"));
        assert!(lines[2].contains("channel_start_analyze"));
        let end = lines.iter().position(|l| l.contains("channel_end_analyze")).unwrap();
        assert!(lines[end + 1].contains("stream_stop"));
        assert!(pipeline.stream().req.analyzers().is_empty());
    }

    #[test]
    fn test_phases_are_pre_then_post() {
        let (sink, mut pipeline) = traced("trace", ProxyMode::Http, true, 64);
        let msg = HttpMessage::new(Direction::Response, StructuredMessage::new().data("ok").end());
        pipeline.replay_http(msg);

        let lines = sink.lines();
        let phase_lines: Vec<_> = lines.iter().filter(|l| l.contains("analyzer=")).collect();
        // Four head phases plus the body phase, each seen before and after
        assert_eq!(phase_lines.len(), 10);
        for pair in phase_lines.chunks(2) {
            assert!(pair[0].contains("channel_pre_analyze") && pair[0].ends_with("step=PRE"));
            assert!(pair[1].contains("channel_post_analyze") && pair[1].ends_with("step=POST"));
        }
        assert!(phase_lines[9].contains("analyzer=RES_HTTP_XFER_BODY"));
    }

    #[test]
    fn test_structured_replay_with_random_forwarding() {
        let (sink, mut pipeline) = traced("trace random-forwarding", ProxyMode::Http, true, 16);
        let msg = HttpMessage::new(
            Direction::Request,
            StructuredMessage::new()
                .start_line("POST", "/upload", "HTTP/1.1")
                .header("content-length", "40")
                .data(vec![b'a'; 25])
                .data(vec![b'b'; 15])
                .trailer("x-checksum", "0")
                .end(),
        );

        let report = pipeline.replay_http(msg);
        assert_eq!(report.forwarded, 40);
        assert!(!report.exhausted);

        let lines = sink.lines();
        let headers = lines.iter().position(|l| l.contains("message_headers")).unwrap();
        let payload = lines.iter().position(|l| l.contains("message_payload_available")).unwrap();
        assert!(headers < payload);
        assert!(lines[headers + 1].ends_with("\tPOST /upload HTTP/1.1"));
        assert!(lines.iter().any(|l| l.contains("message_trailers")));

        let short = lines
            .iter()
            .filter(|l| l.contains("message_payload_available"))
            .filter(|l| {
                let len = field(l, "len=");
                let forward = field(l, "forward=");
                forward < len
            })
            .count();
        assert_eq!(pipeline.reschedules(), short);
    }

    #[test]
    fn test_legacy_replay() {
        let (sink, mut pipeline) = traced("trace random-parsing", ProxyMode::Http, false, 8);
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 20\r\n\r\n0123456789abcdefghij".to_vec();
        let msg = HttpMessage::new(Direction::Response, LegacyMessage::index(raw).unwrap());

        let report = pipeline.replay_http(msg);
        assert_eq!(report.received, 20);
        assert_eq!(report.forwarded, 20);

        let lines = sink.lines();
        assert!(lines.iter().any(|l| l.ends_with("\tHTTP/1.1 200 OK")));
        assert!(lines.iter().any(|l| l.ends_with("\tContent-Length: 20")));
        assert!(lines.iter().any(|l| l.contains("message_body_available")));
        assert!(lines.iter().any(|l| l.contains("message_forward")));
        assert!(lines.iter().all(|l| !l.contains("message_payload_available")));
    }

    #[test]
    fn test_round_limit() {
        let stream = Stream::new(9, Proxy::new("fe", ProxyMode::Tcp), false, 16);
        let mut pipeline = Pipeline::new(Stubborn, filter("trace"), stream).with_max_rounds(5);

        let report = pipeline.replay_tcp(Direction::Request, b"stuck");
        assert!(report.exhausted);
        assert_eq!(report.rounds, 5);
        assert_eq!(report.forwarded, 0);
        assert_eq!(pipeline.reschedules(), 5);
    }

    #[test]
    fn test_routing_and_errors() {
        let (sink, mut pipeline) = traced("trace", ProxyMode::Http, true, 16);
        pipeline.route(Proxy::new("be", ProxyMode::Tcp));
        assert_eq!(pipeline.stream().position(), "backend");
        pipeline.reply_error(502, b"");
        pipeline.expire_timers();
        let msg = HttpMessage::new(Direction::Request, StructuredMessage::new().end());
        pipeline.reset_message(&msg);

        let lines = sink.lines();
        assert!(lines[0].ends_with("backend=be"));
        assert!(lines[1].contains("mode=TCP      (backend) - status=502"));
        assert!(lines[2].contains("check_timeouts"));
        assert!(lines[3].contains("message_reset"));
    }

    fn field(line: &str, key: &str) -> usize {
        let start = line.rfind(key).unwrap() + key.len();
        line[start..].split(' ').next().unwrap().parse().unwrap()
    }
}
