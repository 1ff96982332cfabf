//! Command-line interface
//!
//! Uses clap for argument parsing with one command struct per
//! subcommand. Every command builds a `TradingDesk` over the data
//! directory and the paper broker, then renders its result to stdout;
//! diagnostics go through tracing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::broker::{BrokerPort, PaperBroker};
use crate::config::Settings;
use crate::data_paths::{DataPaths, DEFAULT_DATA_DIR};
use crate::desk::TradingDesk;
use crate::logging::{init_logging, LogMode, LoggingConfig};

pub mod commands;

use commands::cancel::{CancelArgs, CancelCommand};
use commands::enter::{EnterArgs, EnterCommand};
use commands::exit::{ExitArgs, ExitCommand};
use commands::refresh::{RefreshArgs, RefreshCommand};
use commands::snapshot::{SnapshotArgs, SnapshotCommand};
use commands::trades::{TradesArgs, TradesCommand};
use commands::update::{UpdateArgs, UpdateCommand};

#[derive(Parser)]
#[command(name = "ledgerbot")]
#[command(version)]
#[command(about = "Event-sourced paper trading ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory path (default: ./data)
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Verbose logging (console + file instead of file only)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a new trade
    Enter(EnterArgs),

    /// Move the stop loss on an open trade
    Update(UpdateArgs),

    /// Submit the closing order for an open trade
    Exit(ExitArgs),

    /// Cancel a trade before it completes
    Cancel(CancelArgs),

    /// Sync a trade against the broker's active orders
    Refresh(RefreshArgs),

    /// Show the portfolio, live or at a past instant
    Snapshot(SnapshotArgs),

    /// List trades known to the ledger
    Trades(TradesArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let data_paths = DataPaths::new(&self.data_dir);
        data_paths.ensure_directories()?;

        let mode = if self.verbose > 0 {
            LogMode::ConsoleAndFile
        } else {
            LogMode::FileOnly
        };
        init_logging(LoggingConfig::new(mode, data_paths.clone()))?;

        let settings = Settings::load(&data_paths)?;
        let broker: Arc<dyn BrokerPort> = Arc::new(PaperBroker::new());
        let desk = TradingDesk::open(&data_paths, broker, settings)?;

        match self.command {
            Commands::Enter(args) => EnterCommand::new(args).execute(&desk).await,
            Commands::Update(args) => UpdateCommand::new(args).execute(&desk).await,
            Commands::Exit(args) => ExitCommand::new(args).execute(&desk).await,
            Commands::Cancel(args) => CancelCommand::new(args).execute(&desk).await,
            Commands::Refresh(args) => RefreshCommand::new(args).execute(&desk).await,
            Commands::Snapshot(args) => SnapshotCommand::new(args).execute(&desk).await,
            Commands::Trades(args) => TradesCommand::new(args).execute(&desk).await,
        }
    }
}
