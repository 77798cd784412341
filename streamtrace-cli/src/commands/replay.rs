use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use streamtrace_core::config::TraceConfig;
use streamtrace_core::hooks::{FilterInstance, FilterRole};
use streamtrace_core::logging::init_logging;
use streamtrace_core::message::{HttpMessage, LegacyMessage, StructuredMessage};
use streamtrace_core::pipeline::{TransferReport, DEFAULT_MAX_ROUNDS};
use streamtrace_core::simulator::PartialIoSimulator;
use streamtrace_core::stream::{Direction, Proxy, ProxyMode, Stream};
use streamtrace_core::{FilterHooks, Pipeline, TraceFilter};

use super::resolve_config;

/// How the replayed traffic is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Raw bytes
    Tcp,
    /// HTTP as a block list
    Http,
    /// HTTP as a raw buffer with a header index
    HttpRaw,
}

impl Mode {
    fn layout(self) -> (ProxyMode, bool) {
        match self {
            Mode::Tcp => (ProxyMode::Tcp, false),
            Mode::Http => (ProxyMode::Http, true),
            Mode::HttpRaw => (ProxyMode::Http, false),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Filter declaration, e.g. "trace name demo hexdump"
    #[arg(long)]
    pub filter: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, default_value = "streamtrace.toml")]
    pub config: PathBuf,

    /// Frontend proxy name
    #[arg(long, default_value = "fe")]
    pub proxy: String,

    /// Route the stream to this backend before replaying
    #[arg(long)]
    pub backend: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Tcp)]
    pub mode: Mode,

    /// Request bytes (a full HTTP message in HTTP modes)
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Response bytes (a full HTTP message in HTTP modes)
    #[arg(long)]
    pub response: Option<PathBuf>,

    /// Seed for the partial I/O decisions; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Channel buffer capacity in bytes
    #[arg(long, default_value_t = 16 * 1024)]
    pub buffer_size: usize,

    /// Give up on a channel after this many rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,
}

/// What a replay did, printed once the stream is closed
#[derive(Debug)]
pub struct Summary {
    pub reports: Vec<TransferReport>,
    pub reschedules: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            write!(
                f,
                "{:<9} received={} forwarded={} rounds={}",
                format!("{}:", report.direction),
                report.received,
                report.forwarded,
                report.rounds
            )?;
            if report.exhausted {
                f.write_str(" (round limit reached)")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "reschedules: {}", self.reschedules)
    }
}

/// Convert an indexed raw message into blocks
fn to_structured(legacy: &LegacyMessage) -> StructuredMessage {
    let head = &legacy.raw()[..legacy.body_start()];
    let mut lines = head
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty());

    let mut msg = StructuredMessage::new();
    if let Some(start) = lines.next() {
        let mut parts = start.splitn(3, |b| *b == b' ');
        let mut part = || parts.next().unwrap_or_default().to_vec();
        let (p1, p2, p3) = (part(), part(), part());
        msg = msg.start_line(p1, p2, p3);
    }
    for line in lines {
        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(colon) => (&line[..colon], line[colon + 1..].trim_ascii_start()),
            None => (line, &[][..]),
        };
        msg = msg.header(name.to_vec(), value.to_vec());
    }
    if !legacy.body().is_empty() {
        msg = msg.data(legacy.body().to_vec());
    }
    msg.end()
}

fn http_message(direction: Direction, raw: Vec<u8>, structured: bool) -> Result<HttpMessage> {
    let legacy = LegacyMessage::index(raw).context("Failed to index HTTP message")?;
    if structured {
        Ok(HttpMessage::new(direction, to_structured(&legacy)))
    } else {
        Ok(HttpMessage::new(direction, legacy))
    }
}

/// Replay the configured files through one traced stream
pub fn run(args: &ReplayArgs) -> Result<Summary> {
    let config = resolve_config(args.filter.as_deref(), &args.config)?;
    init_logging(&config.logging.level);

    let simulator = args.seed.map(PartialIoSimulator::seeded).unwrap_or_default();
    let hooks = TraceFilter::new(config.logging.sink.build(), simulator);
    let conf = Arc::new(TraceConfig::new(config.trace, &args.proxy));
    hooks.check(&conf)?;
    hooks.init(&conf)?;
    hooks.init_per_worker(&conf, 0)?;

    let (proxy_mode, structured) = args.mode.layout();
    let stream = Stream::new(1, Proxy::new(&args.proxy, proxy_mode), structured, args.buffer_size);
    let filter = FilterInstance::new(conf.clone(), FilterRole::Frontend);
    let mut pipeline = Pipeline::new(hooks, filter, stream).with_max_rounds(args.max_rounds);

    if !pipeline.open() {
        bail!("Filter declined the stream");
    }
    if let Some(backend) = &args.backend {
        pipeline.route(Proxy::new(backend.as_str(), proxy_mode));
    }

    let inputs = [(Direction::Request, &args.request), (Direction::Response, &args.response)];
    let mut reports = Vec::new();
    for (direction, path) in inputs {
        let Some(path) = path else { continue };
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        log::debug!("Replaying {} bytes from {} as {}", bytes.len(), path.display(), direction);

        let report = match args.mode {
            Mode::Tcp => pipeline.replay_tcp(direction, &bytes),
            Mode::Http | Mode::HttpRaw => {
                let msg = http_message(direction, bytes, structured)
                    .with_context(|| format!("Invalid HTTP message in {}", path.display()))?;
                pipeline.replay_http(msg)
            }
        };
        reports.push(report);
    }

    pipeline.close();
    pipeline.hooks().deinit_per_worker(&conf, 0);
    pipeline.hooks().deinit(&conf);

    Ok(Summary { reports, reschedules: pipeline.reschedules() })
}
