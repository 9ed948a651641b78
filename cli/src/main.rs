mod commands;
mod config;
mod garmin;
mod logging;
mod session;

use anyhow::Result;
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{cmd_export, cmd_history, cmd_schedule, cmd_sync, parse_time};
use crate::config::Config;
use weightsync_core::schedule::Schedule;
use weightsync_core::sync::SyncMode;

#[derive(Parser)]
#[command(
    name = "weightsync",
    version,
    about = "Sync Garmin Connect weight measurements into a local SQLite database",
    long_about = "Sync Garmin Connect weight measurements into a local SQLite database.\n\n\
        Credentials are read from GARMIN_EMAIL and GARMIN_PASSWORD."
)]
struct Cli {
    /// Path to the SQLite database (default: platform data directory)
    #[arg(long, global = true, env = "WEIGHTSYNC_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the last N days once
    Recent {
        /// Number of days to look back from today
        #[arg(short, long, default_value = "10")]
        days: u32,
    },
    /// Sync the full history Garmin still has
    All,
    /// Run a lookback sync every day at a fixed local time, forever
    Schedule {
        /// Local time of day to sync (HH:MM)
        #[arg(long, default_value = "09:00", value_parser = parse_time)]
        at: NaiveTime,
        /// Days to re-fetch on each run
        #[arg(long, default_value = "3")]
        lookback: u32,
    },
    /// Show stored measurements, newest first
    History {
        /// Number of rows to show (default: all)
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export stored measurements as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    tracing::debug!(db = %config.db_path.display(), "using database");

    match cli.command {
        Commands::Recent { days } => cmd_sync(&config, SyncMode::Recent { days }),
        Commands::All => cmd_sync(&config, SyncMode::All),
        Commands::Schedule { at, lookback } => cmd_schedule(
            &config,
            Schedule {
                at,
                lookback_days: lookback,
            },
        ),
        Commands::History { days, json } => cmd_history(&config, days, json),
        Commands::Export { output } => cmd_export(&config, output.as_deref()),
    }
}
