use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod server;
mod signal;

#[derive(Parser)]
#[command(name = "kubeplug", about = "Host for dynamically loaded controllers")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load controllers and run the reconciliation engine
    Run(commands::run::RunArgs),
    /// Load controllers and report what loaded, without running them
    Inspect(commands::inspect::InspectArgs),
}

/// Install the global subscriber. Must run before anything logs.
///
/// `RUST_LOG` wins over the default level; `--verbose` wins over both.
fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Inspect(args) => commands::inspect::run(args),
    }
}
