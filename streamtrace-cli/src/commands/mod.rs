pub mod check;
pub mod replay;

use anyhow::{Context, Result};
use std::path::Path;
use streamtrace_core::config::{StreamtraceConfig, TraceOptions};

/// Resolve the configuration, letting a declaration replace the `[trace]` section
pub fn resolve_config(filter: Option<&str>, path: &Path) -> Result<StreamtraceConfig> {
    let mut config = StreamtraceConfig::load_from(path)?;
    if let Some(declaration) = filter {
        config.trace = declaration
            .parse::<TraceOptions>()
            .with_context(|| format!("Invalid filter declaration \"{}\"", declaration))?;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn declaration_replaces_file_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[trace]\nname = \"fromfile\"\nhexdump = true").unwrap();

        let config = resolve_config(None, file.path()).unwrap();
        assert_eq!(config.trace.name.as_deref(), Some("fromfile"));

        let config = resolve_config(Some("trace random-parsing"), file.path()).unwrap();
        assert!(config.trace.name.is_none());
        assert!(!config.trace.hexdump);
        assert!(config.trace.random_parsing);
    }

    #[test]
    fn bad_declaration_names_the_option() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_config(Some("trace name"), &tmp.path().join("none.toml")).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("'trace' : 'name' option without value"), "{}", msg);
    }
}
