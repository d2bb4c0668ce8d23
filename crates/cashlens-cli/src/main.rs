//! Cashlens CLI - Ledger analysis
//!
//! Usage:
//!   cashlens parse --file ledger.csv       Preview normalized transactions
//!   cashlens analyze --file ledger.xlsx    Build the analysis dashboard

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Parse { file } => commands::cmd_parse(&file).await,
        Commands::Analyze {
            file,
            config,
            dispatch_url,
            status_url,
            poll_interval_ms,
            timeout_secs,
            local,
            json,
        } => {
            let options = commands::AnalyzeOptions {
                config,
                dispatch_url,
                status_url,
                poll_interval_ms,
                timeout_secs,
                local,
                json,
            };
            commands::cmd_analyze(&file, options).await
        }
    }
}
