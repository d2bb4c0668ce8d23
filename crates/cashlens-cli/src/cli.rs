//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cashlens - Turn a transaction ledger into spending insights
#[derive(Parser)]
#[command(name = "cashlens")]
#[command(about = "Ledger analysis with remote insights and local fallback", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a ledger file and preview the normalized transactions
    Parse {
        /// Ledger file (.csv, .tsv, .xlsx or .xls)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Analyze a ledger file and print the dashboard
    Analyze {
        /// Ledger file (.csv, .tsv, .xlsx or .xls)
        #[arg(short, long)]
        file: PathBuf,

        /// Config file (defaults to ~/.config/cashlens/cashlens.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Remote analysis endpoint (overrides config and CASHLENS_DISPATCH_URL)
        #[arg(long)]
        dispatch_url: Option<String>,

        /// Status endpoint for asynchronous jobs
        #[arg(long)]
        status_url: Option<String>,

        /// Delay between status requests in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Give up on the remote service after this many seconds
        ///
        /// Without a limit an asynchronous job is polled until it completes
        /// or Ctrl-C is pressed.
        #[arg(short, long)]
        timeout_secs: Option<u64>,

        /// Skip the remote service and compute metrics locally
        #[arg(long)]
        local: bool,

        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,
    },
}
