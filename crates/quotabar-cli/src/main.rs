//! Quotabar CLI - Claude usage monitor
//!
//! Polls the Claude usage endpoint in the foreground, prints the tray status
//! whenever it changes and raises alerts when usage thresholds are crossed.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quotabar")]
#[command(author, version, about = "Claude usage monitor", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Override config file path (or set QUOTABAR_CONFIG env var)
    #[arg(long, env = "QUOTABAR_CONFIG", global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll usage until interrupted (type `r` + Enter to refresh, `q` to quit)
    Run,

    /// Fetch usage once and print it
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => quotabar_core::config::default_config_path()?,
    };

    // Config errors surface from the command itself; here only the log level matters
    let debug_mode = quotabar_core::AppConfig::load(&config_path)
        .map(|c| c.debug_mode)
        .unwrap_or(false);
    init_logging(cli.verbose || debug_mode, cli.quiet);

    // Create context for commands
    let ctx = commands::Context {
        config_path,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Run => commands::run::execute(&ctx).await,
        Commands::Status => commands::status::execute(&ctx).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    }
}

/// `RUST_LOG` overrides the level picked from the flags
fn init_logging(debug: bool, quiet: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}
