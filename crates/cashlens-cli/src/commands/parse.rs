//! Ledger parsing command

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use cashlens_core::{
    import::{load_file, FsSource},
    normalize::normalize,
    session::PREVIEW_ROWS,
    Transaction,
};

use super::truncate;

pub async fn cmd_parse(file: &Path) -> Result<()> {
    println!("📥 Parsing {}...", file.display());

    let rows = load_file(&FsSource, file)
        .await
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let transactions = normalize(&rows);

    println!("   Found {} transactions", transactions.len());
    if transactions.is_empty() {
        println!("   (no data rows below the header)");
        return Ok(());
    }

    println!();
    print!("{}", render_preview(&transactions));
    Ok(())
}

/// Fixed-width preview of the first rows: amount, category, then the
/// original columns
pub fn render_preview(transactions: &[Transaction]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "   {:>12}  {:<16}  Row", "Amount", "Category");
    let _ = writeln!(out, "   {}", "─".repeat(60));

    for tx in transactions.iter().take(PREVIEW_ROWS) {
        let row = tx
            .fields
            .iter()
            .map(|(column, value)| format!("{}={}", column, value))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "   {:>12.2}  {:<16}  {}",
            tx.amount,
            truncate(&tx.category, 16),
            truncate(&row, 60)
        );
    }

    if transactions.len() > PREVIEW_ROWS {
        let _ = writeln!(out, "   ... and {} more", transactions.len() - PREVIEW_ROWS);
    }
    out
}
