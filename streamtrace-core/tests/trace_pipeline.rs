//! End-to-end tests driving the trace filter through the host pipeline

use std::sync::Arc;
use streamtrace_core::prelude::*;

fn field(line: &str, key: &str) -> usize {
    let start = line.rfind(key).unwrap_or_else(|| panic!("no {} in {}", key, line)) + key.len();
    line[start..].split(' ').next().unwrap().parse().unwrap()
}

fn pipeline(
    declaration: &str,
    mode: ProxyMode,
    structured: bool,
    capacity: usize,
    seed: u64,
) -> (Arc<MemorySink>, Pipeline) {
    let sink = Arc::new(MemorySink::new());
    let hooks = TraceFilter::new(sink.clone(), PartialIoSimulator::seeded(seed));
    let options: TraceOptions = declaration.parse().unwrap();
    let config = Arc::new(TraceConfig::new(options, "fe_main"));
    let filter = FilterInstance::new(config, FilterRole::Frontend);
    let stream = Stream::new(0x1234, Proxy::new("fe_main", mode), structured, capacity);
    (sink, Pipeline::new(hooks, filter, stream))
}

fn is_dump_row(line: &str) -> bool {
    line.starts_with("\t0x")
}

#[test]
fn test_demo_scenario() {
    let (sink, mut pipeline) = pipeline("trace name demo hexdump", ProxyMode::Http, true, 1024, 1);
    let msg = HttpMessage::new(
        Direction::Request,
        StructuredMessage::new().header("host", "example.com").data("0123456789").end(),
    );

    assert!(pipeline.open());
    let report = pipeline.replay_http(msg);
    pipeline.close();

    assert_eq!(report.forwarded, 10);
    assert_eq!(pipeline.reschedules(), 0);

    let lines = sink.lines();
    assert!(lines.iter().all(|l| is_dump_row(l) || l.contains("[demo/fe_main        ]")));

    let header = lines.iter().position(|l| l.ends_with("\thost: example.com")).unwrap();
    let payload = lines.iter().position(|l| l.contains("message_payload_available")).unwrap();
    assert!(header < payload);
    assert!(lines[payload].ends_with("offset=0 - len=10 - forward=10"));

    assert!(is_dump_row(&lines[payload + 1]));
    assert!(!is_dump_row(&lines[payload + 2]));
    assert_eq!(
        lines[payload + 1],
        format!("\t0x000000: 30 31 32 33 34 35 36 37   38 39 {}  |0123456789|", "   ".repeat(6))
    );
}

#[test]
fn test_tcp_reschedules_once_per_short_call() {
    for seed in [1, 7, 42, 1000] {
        let (sink, mut pipeline) =
            pipeline("trace random-parsing random-forwarding", ProxyMode::Tcp, false, 64, seed);
        let input: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        pipeline.open();
        let request = pipeline.replay_tcp(Direction::Request, &input);
        let response = pipeline.replay_tcp(Direction::Response, b"pong");
        pipeline.close();

        assert_eq!(request.forwarded, 1000);
        assert_eq!(response.forwarded, 4);

        let lines = sink.lines();
        let short_reads = lines
            .iter()
            .filter(|l| l.contains("raw_data_available"))
            .filter(|l| field(l, "consume=") < field(l, "avail="))
            .count();
        let short_forwards = lines
            .iter()
            .filter(|l| l.contains("raw_forward"))
            .filter(|l| field(l, "forward=") < field(l, "len="))
            .count();
        assert_eq!(pipeline.reschedules(), short_reads + short_forwards, "seed {}", seed);
        assert!(pipeline.reschedules() > 0);
    }
}

#[test]
fn test_legacy_reschedules_once_per_short_call() {
    let (sink, mut pipeline) =
        pipeline("trace random-parsing random-forwarding hexdump", ProxyMode::Http, false, 32, 5);
    let body = "x".repeat(300);
    let raw = format!("POST /items HTTP/1.1\r\nHost: a\r\nContent-Length: 300\r\n\r\n{}", body);
    let msg = HttpMessage::new(Direction::Request, LegacyMessage::index(raw.into_bytes()).unwrap());

    let report = pipeline.replay_http(msg);
    assert_eq!(report.forwarded, 300);

    let lines = sink.lines();
    let short_reads = lines
        .iter()
        .filter(|l| l.contains("message_body_available"))
        .filter(|l| field(l, "consume=") < field(l, "avail="))
        .count();
    let short_forwards = lines
        .iter()
        .filter(|l| l.contains("message_forward"))
        .filter(|l| {
            let forward = field(l, "forward=");
            forward < field(l, "len=") || field(l, "nxt=") != field(l, "fwd=") + forward
        })
        .count();
    assert_eq!(pipeline.reschedules(), short_reads + short_forwards);

    // Dumps cover forwarded body bytes only
    let rows: Vec<_> = lines.iter().filter(|l| is_dump_row(l)).collect();
    assert!(!rows.is_empty());
    for row in rows {
        let ascii = &row[row.find('|').unwrap()..];
        assert!(ascii.trim_matches('|').chars().all(|c| c == 'x'), "{}", row);
    }
}

#[test]
fn test_structured_cap_never_claims_missing_payload() {
    for bound in ["proposed", "requested"] {
        let sink = Arc::new(MemorySink::new());
        let hooks = TraceFilter::new(sink.clone(), PartialIoSimulator::seeded(77));
        let mut options: TraceOptions = "trace random-forwarding".parse().unwrap();
        options.rescan_bound = bound.parse().unwrap();
        let filter =
            FilterInstance::new(Arc::new(TraceConfig::new(options, "fe")), FilterRole::Frontend);
        let strm = Stream::new(1, Proxy::new("fe", ProxyMode::Http), true, 64);

        // 6 payload bytes, but the host asks about 12
        let msg = HttpMessage::new(
            Direction::Request,
            StructuredMessage::new().data("abc").data("def").end(),
        );
        for _ in 0..200 {
            let verdict = hooks.message_payload_available(&filter, &strm, &msg, 0, 12);
            assert!(verdict.amount <= 6 || verdict.amount == 12);
            assert_eq!(verdict.reschedule, verdict.amount < 12);
        }
    }
}

#[test]
fn test_declaration_errors() {
    let err = "trace name".parse::<TraceOptions>().unwrap_err();
    assert_eq!(err.to_string(), "'trace' : 'name' option without value");

    let err = "trace hexdump loud".parse::<TraceOptions>().unwrap_err();
    assert!(err.to_string().contains("'trace'"));
    assert!(err.to_string().contains("'loud'"));

    let err: Error = "compress".parse::<TraceOptions>().unwrap_err().into();
    assert!(err.to_string().starts_with("Configuration error:"));
}
