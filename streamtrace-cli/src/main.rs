//! Streamtrace CLI: replay synthetic traffic through the trace filter.
//!
//! ```bash
//! streamtrace replay --filter "trace name demo hexdump" --mode http --request req.txt
//! streamtrace check --filter "trace random-forwarding"
//! ```
//!
//! See `streamtrace --help` for all available commands and options.

mod commands;

use clap::{Parser, Subcommand};
use commands::replay::ReplayArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamtrace", about = "Trace and perturb a proxy stream pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push request and response files through one traced stream
    Replay(ReplayArgs),

    /// Parse a filter declaration and print the resolved configuration
    Check {
        /// Filter declaration, e.g. "trace name demo hexdump"
        #[arg(long)]
        filter: Option<String>,

        /// Configuration file (TOML)
        #[arg(long, default_value = "streamtrace.toml")]
        config: PathBuf,

        /// Proxy the declaration is attached to
        #[arg(long, default_value = "fe")]
        proxy: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay(args) => commands::replay::run(&args).map(|summary| print!("{}", summary)),
        Commands::Check { filter, config, proxy } => {
            commands::check::run(filter.as_deref(), &config, &proxy)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
