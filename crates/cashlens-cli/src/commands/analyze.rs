//! Analysis command: file → dispatcher → dashboard

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cashlens_core::{
    AnalysisDispatcher, CancelToken, Dashboard, RemoteSettings, ResultSource, Session, Settings,
};
use tracing::{debug, info, warn};

use super::truncate;

/// Flags of the `analyze` subcommand
#[derive(Debug, Default, Clone)]
pub struct AnalyzeOptions {
    pub config: Option<PathBuf>,
    pub dispatch_url: Option<String>,
    pub status_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub local: bool,
    pub json: bool,
}

pub async fn cmd_analyze(file: &Path, options: AnalyzeOptions) -> Result<()> {
    let mut settings = Settings::load(options.config.as_deref())?;
    settings.apply(RemoteSettings {
        dispatch_url: options.dispatch_url.clone(),
        status_url: options.status_url.clone(),
        poll_interval_ms: options.poll_interval_ms,
        request_timeout_secs: None,
    });

    let dispatcher = build_dispatcher(&settings, options.local)?;
    if !options.json {
        match &dispatcher {
            Some(d) => println!("🔍 Analyzing {} via {}...", file.display(), d.config().dispatch_url),
            None => println!("🔍 Analyzing {} locally...", file.display()),
        }
    }

    let cancel = CancelToken::new();
    spawn_cancel_triggers(&cancel, options.timeout_secs);

    let dashboard = run_analysis(file, dispatcher, &cancel).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print!("{}", render_dashboard(&dashboard));
    }
    Ok(())
}

/// Remote dispatcher from settings, or `None` for local-only analysis
pub fn build_dispatcher(
    settings: &Settings,
    local_only: bool,
) -> Result<Option<Arc<AnalysisDispatcher>>> {
    if local_only {
        debug!("Remote analysis disabled by --local");
        return Ok(None);
    }
    let Some(config) = settings.dispatcher_config()? else {
        info!("No dispatch URL configured, analyzing locally");
        return Ok(None);
    };
    let dispatcher = AnalysisDispatcher::http(config).context("Failed to build HTTP client")?;
    Ok(Some(Arc::new(dispatcher)))
}

/// Load a ledger and build its dashboard
pub async fn run_analysis(
    file: &Path,
    dispatcher: Option<Arc<AnalysisDispatcher>>,
    cancel: &CancelToken,
) -> Result<Dashboard> {
    let mut session = Session::new(dispatcher);
    session
        .load(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let dashboard = session.create_dashboard(cancel).await?;
    Ok(dashboard.clone())
}

/// Cancel on Ctrl-C and, when set, after the timeout elapses
fn spawn_cancel_triggers(cancel: &CancelToken, timeout_secs: Option<u64>) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling analysis");
                cancel.cancel();
            }
        });
    }

    if let Some(secs) = timeout_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(timeout_secs = secs, "Analysis timed out, cancelling");
            cancel.cancel();
        });
    }
}

pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let metrics = &dashboard.metrics;
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "╭─────────────────────────────────────────╮");
    let _ = writeln!(out, "│          💰 Cashlens Dashboard          │");
    let _ = writeln!(out, "╰─────────────────────────────────────────╯");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Transactions:    {}", dashboard.transaction_count);
    let _ = writeln!(out, "  Source:          {}", source_label(dashboard.source));
    let _ = writeln!(out);
    let _ = writeln!(out, "  Income:          ${:.2}", metrics.total_income);
    let _ = writeln!(out, "  Expenses:        ${:.2}", metrics.total_expenses);
    let _ = writeln!(out, "  Net cash flow:   ${:.2}", metrics.net_cash_flow);
    let _ = writeln!(out, "  Savings rate:    {}%", metrics.savings_rate);
    let _ = writeln!(out, "  Top expense:     {}", metrics.top_expense_category);

    let _ = writeln!(out);
    let _ = writeln!(out, "  📝 {}", dashboard.summary);
    if !dashboard.suggestions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  💡 Suggestions:");
        for suggestion in &dashboard.suggestions {
            let _ = writeln!(out, "     • {}", suggestion);
        }
    }

    let charts = &dashboard.charts;
    let _ = writeln!(out);
    if charts.placeholder {
        let _ = writeln!(out, "  📈 Charts (placeholder data):");
    } else {
        let _ = writeln!(out, "  📈 Income vs expenses:");
    }
    for point in &charts.income_expense_by_period {
        let _ = writeln!(
            out,
            "     {:<10} in ${:>10.2}   out ${:>10.2}",
            truncate(&point.period, 10),
            point.income,
            point.expenses
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  🥧 Expenses by category:");
    for share in &charts.expense_share_by_category {
        let _ = writeln!(
            out,
            "     {:<20} {:>5.0}%",
            truncate(&share.category, 20),
            share.value
        );
    }
    let _ = writeln!(out);
    out
}

fn source_label(source: ResultSource) -> &'static str {
    match source {
        ResultSource::Remote => "remote analysis",
        ResultSource::RemotePolled => "remote analysis (async job)",
        ResultSource::LocalFallback => "local fallback",
    }
}
