//! The trace filter
//!
//! Logs every pipeline event it is handed and, when asked to, lies about how
//! much data it consumed or forwarded so the host's partial I/O paths run.

use super::traits::{body_available, ChannelRegistration, FilterHooks, FilterInstance};
use crate::config::TraceConfig;
use crate::hexdump::{payload_hexdump, ring_hexdump};
use crate::logging::{DiagnosticSink, StderrSink, TraceLine};
use crate::message::{HttpMessage, MessageRepresentation, MessageView};
use crate::simulator::{PartialIoSimulator, PayloadWindow, Verdict};
use crate::stream::{AnalyzerMask, AnalyzerPhase, Channel, Proxy, Stream};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Hook set writing one line per event to a diagnostic sink
pub struct TraceFilter {
    sink: Arc<dyn DiagnosticSink>,
    simulator: PartialIoSimulator,
    clock: fn() -> DateTime<Utc>,
}

impl TraceFilter {
    pub fn new(sink: Arc<dyn DiagnosticSink>, simulator: PartialIoSimulator) -> Self {
        Self { sink, simulator, clock: Utc::now }
    }

    /// Replace the wall clock used to stamp lines
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn simulator(&self) -> &PartialIoSimulator {
        &self.simulator
    }

    fn global(&self, conf: &TraceConfig, message: String) {
        let line = TraceLine::global((self.clock)(), conf.display_name(), message);
        self.sink.append_line(&line.to_string());
    }

    fn event(&self, filter: &FilterInstance, strm: &Stream, event: &str, fields: String) {
        let line =
            TraceLine::stream((self.clock)(), filter.config().display_name(), strm, event, fields);
        self.sink.append_line(&line.to_string());
    }

    fn channel_event(&self, filter: &FilterInstance, strm: &Stream, chn: &Channel, event: &str) {
        self.event(filter, strm, event, channel_fields(strm, chn));
    }

    fn dump(&self, rows: Vec<String>) {
        for row in rows {
            self.sink.append_line(&row);
        }
    }
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self::new(Arc::new(StderrSink), PartialIoSimulator::default())
    }
}

impl fmt::Debug for TraceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceFilter").field("simulator", &self.simulator).finish_non_exhaustive()
    }
}

fn channel_fields(strm: &Stream, chn: &Channel) -> String {
    format!("channel={:<10} - mode={:<8} ({})", chn.direction(), strm.mode(), strm.position())
}

impl FilterHooks for TraceFilter {
    fn init(&self, conf: &TraceConfig) -> crate::Result<()> {
        let opts = conf.options();
        self.global(
            conf,
            format!(
                "filter initialized [read random={} - fwd random={} - hexdump={}]",
                opts.random_parsing, opts.random_forwarding, opts.hexdump
            ),
        );
        Ok(())
    }

    fn deinit(&self, conf: &TraceConfig) {
        self.global(conf, "filter deinitialized".to_string());
    }

    fn init_per_worker(&self, conf: &TraceConfig, worker: usize) -> crate::Result<()> {
        self.global(conf, format!("filter initialized for worker {}", worker));
        Ok(())
    }

    fn deinit_per_worker(&self, conf: &TraceConfig, worker: usize) {
        self.global(conf, format!("filter deinitialized for worker {}", worker));
    }

    fn attach(&self, filter: &FilterInstance, strm: &Stream) -> bool {
        self.event(filter, strm, "attach", format!("filter-type={}", filter.role()));
        true
    }

    fn detach(&self, filter: &FilterInstance, strm: &Stream) {
        self.event(filter, strm, "detach", format!("filter-type={}", filter.role()));
    }

    fn stream_start(&self, filter: &FilterInstance, strm: &Stream) {
        self.event(filter, strm, "stream_start", String::new());
    }

    fn stream_set_backend(&self, filter: &FilterInstance, strm: &Stream, backend: &Proxy) {
        self.event(filter, strm, "stream_set_backend", format!("backend={}", backend.id));
    }

    fn stream_stop(&self, filter: &FilterInstance, strm: &Stream) {
        self.event(filter, strm, "stream_stop", String::new());
    }

    fn check_timeouts(&self, filter: &FilterInstance, strm: &Stream) {
        self.event(filter, strm, "check_timeouts", String::new());
    }

    fn channel_start_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
    ) -> ChannelRegistration {
        self.channel_event(filter, strm, chn, "channel_start_analyze");
        ChannelRegistration {
            pre_analyzers: AnalyzerMask::ALL,
            post_analyzers: AnalyzerMask::ALL,
            data_filter: true,
        }
    }

    fn channel_pre_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        phase: AnalyzerPhase,
    ) {
        self.event(filter, strm, "channel_pre_analyze", analyze_fields(strm, chn, phase));
    }

    fn channel_post_analyze(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        phase: AnalyzerPhase,
    ) {
        self.event(filter, strm, "channel_post_analyze", analyze_fields(strm, chn, phase));
    }

    fn channel_end_analyze(&self, filter: &FilterInstance, strm: &Stream, chn: &Channel) {
        self.channel_event(filter, strm, chn, "channel_end_analyze");
    }

    fn message_headers(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {
        self.channel_event(filter, strm, strm.channel(msg.direction), "message_headers");
        for line in msg.repr.header_lines() {
            let line = TraceLine::stream(
                (self.clock)(),
                filter.config().display_name(),
                strm,
                "",
                format!("\t{}", line),
            );
            self.sink.append_line(&line.to_string());
        }
    }

    fn message_payload_available(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
        offset: usize,
        len: usize,
    ) -> Verdict {
        let opts = filter.config().options();
        let window = PayloadWindow { view: &msg.repr, offset, bound: opts.rescan_bound };
        let verdict = self.simulator.decide_forward(len, opts.random_forwarding, Some(window));

        self.event(
            filter,
            strm,
            "message_payload_available",
            format!(
                "{} - offset={} - len={} - forward={}",
                channel_fields(strm, strm.channel(msg.direction)),
                offset,
                len,
                verdict.amount
            ),
        );
        if opts.hexdump {
            self.dump(payload_hexdump(&msg.repr, offset, len));
        }
        verdict
    }

    fn message_body_available(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
    ) -> Verdict {
        let chn = strm.channel(msg.direction);
        let avail = body_available(chn, msg);
        let randomize = filter.config().options().random_parsing;
        let verdict = self.simulator.decide_consume(avail, randomize);

        self.event(
            filter,
            strm,
            "message_body_available",
            format!(
                "{} - chunk_len={} - next={} - fwd={} - avail={} - consume={}",
                channel_fields(strm, chn),
                msg.chunk_len,
                chn.next(),
                chn.forwarded(),
                avail,
                verdict.amount
            ),
        );
        verdict
    }

    fn message_trailers(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {
        self.channel_event(filter, strm, strm.channel(msg.direction), "message_trailers");
    }

    fn message_end(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {
        self.channel_event(filter, strm, strm.channel(msg.direction), "message_end");
    }

    fn message_reset(&self, filter: &FilterInstance, strm: &Stream, msg: &HttpMessage) {
        self.channel_event(filter, strm, strm.channel(msg.direction), "message_reset");
    }

    fn message_error_reply(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        status: u16,
        body: &[u8],
    ) {
        self.event(
            filter,
            strm,
            "message_error_reply",
            format!(
                "channel={:<10} - mode={:<8} ({}) - status={} - len={}",
                "-",
                strm.mode(),
                strm.position(),
                status,
                body.len()
            ),
        );
    }

    fn message_forward(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        msg: &HttpMessage,
        len: usize,
    ) -> Verdict {
        let opts = filter.config().options();
        let chn = strm.channel(msg.direction);
        let window = msg.repr.is_structured().then_some(PayloadWindow {
            view: &msg.repr,
            offset: msg.sent,
            bound: opts.rescan_bound,
        });
        let verdict = self.simulator.decide_forward(len, opts.random_forwarding, window);
        // The inspected boundary must land exactly where forwarding stops
        let verdict = verdict.reschedule_if(chn.next() != chn.forwarded() + verdict.amount);

        self.event(
            filter,
            strm,
            "message_forward",
            format!(
                "{} - len={} - nxt={} - fwd={} - forward={}",
                channel_fields(strm, chn),
                len,
                chn.next(),
                chn.forwarded(),
                verdict.amount
            ),
        );
        if opts.hexdump {
            let rows = match msg.repr {
                MessageRepresentation::Structured(_) => {
                    payload_hexdump(&msg.repr, msg.sent, verdict.amount)
                }
                MessageRepresentation::Legacy(_) => {
                    ring_hexdump(chn.buffer(), chn.forwarded(), verdict.amount)
                }
            };
            self.dump(rows);
        }
        verdict
    }

    fn raw_data_available(&self, filter: &FilterInstance, strm: &Stream, chn: &Channel) -> Verdict {
        let avail = chn.unparsed();
        let randomize = filter.config().options().random_parsing;
        let verdict = self.simulator.decide_consume(avail, randomize);

        self.event(
            filter,
            strm,
            "raw_data_available",
            format!(
                "{} - next={} - avail={} - consume={}",
                channel_fields(strm, chn),
                chn.next(),
                avail,
                verdict.amount
            ),
        );
        verdict
    }

    fn raw_forward(
        &self,
        filter: &FilterInstance,
        strm: &Stream,
        chn: &Channel,
        len: usize,
    ) -> Verdict {
        let opts = filter.config().options();
        let verdict = self.simulator.decide_forward(len, opts.random_forwarding, None);

        self.event(
            filter,
            strm,
            "raw_forward",
            format!(
                "{} - len={} - fwd={} - forward={}",
                channel_fields(strm, chn),
                len,
                chn.forwarded(),
                verdict.amount
            ),
        );
        if opts.hexdump {
            self.dump(ring_hexdump(chn.buffer(), chn.forwarded(), verdict.amount));
        }
        verdict
    }
}

/// Channel fields plus the phase name and whether it has run yet
fn analyze_fields(strm: &Stream, chn: &Channel, phase: AnalyzerPhase) -> String {
    let step = if chn.analyzers().contains(phase) { "PRE" } else { "POST" };
    format!("{} - analyzer={} - step={}", channel_fields(strm, chn), phase, step)
}
