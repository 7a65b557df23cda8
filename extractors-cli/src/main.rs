//! extractors — run registry-described file extractors.
//!
//! # Usage
//!
//! ```text
//! extractors extract <input> --type <id> [--output <path>] [--output-type <t>]
//!                    [--mode python|cli] [--no-install] [--no-isolate]
//!                    [--entry <file>] [--registry <url>] [--timeout <secs>] [--dry-run]
//! extractors lookup <type> [--registry <url>] [--json]
//! extractors env list [--json]
//! extractors env path <id>
//! extractors env remove <id>
//! ```

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{env::EnvCommand, extract::ExtractArgs, lookup::LookupArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "extractors",
    version,
    about = "Find, install and run file extractors from the extractor registry",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract structured data from a file.
    Extract(ExtractArgs),

    /// Show the extractors registered for a file type.
    Lookup(LookupArgs),

    /// Manage isolated extractor environments.
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Extract(args) => args.run(),
        Commands::Lookup(args) => args.run(),
        Commands::Env { command } => commands::env::run(command),
    }
}

/// Logs go to stderr so that stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
