use anyhow::Result;
use std::path::Path;
use streamtrace_core::config::TraceConfig;
use streamtrace_core::FilterHooks;
use streamtrace_core::TraceFilter;

use super::resolve_config;

fn describe(conf: &TraceConfig) -> String {
    let opts = conf.options();
    [
        ("filter", conf.display_name().to_string()),
        ("random-parsing", opts.random_parsing.to_string()),
        ("random-forwarding", opts.random_forwarding.to_string()),
        ("hexdump", opts.hexdump.to_string()),
        ("rescan-bound", opts.rescan_bound.to_string()),
    ]
    .iter()
    .map(|(key, value)| format!("{:<19}{}\n", format!("{}:", key), value))
    .collect()
}

/// Resolve a declaration, run the filter's configuration check, print the result
pub fn run(filter: Option<&str>, config_path: &Path, proxy: &str) -> Result<()> {
    let config = resolve_config(filter, config_path)?;
    let conf = TraceConfig::new(config.trace, proxy);
    TraceFilter::default().check(&conf)?;
    print!("{}", describe(&conf));
    Ok(())
}
