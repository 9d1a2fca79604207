//! Labwatch CLI - labwatch command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Labwatch - Live change feed for your Lab directory
#[derive(Parser)]
#[command(name = "labwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the lab and print every change
    Watch {
        /// Lab directory (default: `labpath` from the config file)
        #[arg(long)]
        lab: Option<PathBuf>,

        /// Poll interval in milliseconds (default: from the config file)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,

        /// Include dot-files and dot-directories
        #[arg(long)]
        show_hidden: bool,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path {
        /// Create the file with defaults if it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Set the lab directory
    SetLab {
        /// Lab directory
        path: PathBuf,
    },

    /// Print an annotated example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; the guard flushes the log file on exit
    let _log_guard = cli_lib::logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch { lab, interval_ms, json, show_hidden } => {
            cmd::watch::run(cmd::watch::WatchOptions { lab, interval_ms, json, show_hidden }).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::run_show().await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::SetLab { path } => cmd::config::run_set_lab(&path).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
