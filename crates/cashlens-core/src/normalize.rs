//! Raw row to transaction normalization
//!
//! Total: every row becomes a transaction. Missing or unreadable amounts
//! become 0, missing categories become "Uncategorized".

use tracing::debug;

use crate::models::{CellValue, RawRow, Transaction, UNCATEGORIZED};

const AMOUNT_FIELDS: [&str; 2] = ["Amount", "amount"];
const CATEGORY_FIELDS: [&str; 2] = ["Category", "category"];

/// Normalize rows into transactions, preserving order
pub fn normalize(rows: &[RawRow]) -> Vec<Transaction> {
    let transactions: Vec<Transaction> = rows.iter().map(normalize_row).collect();

    let zero_amounts = transactions.iter().filter(|t| t.amount == 0.0).count();
    debug!(rows = rows.len(), zero_amounts, "Normalized transactions");

    transactions
}

/// Normalize a single row
pub fn normalize_row(row: &RawRow) -> Transaction {
    let amount = lookup(row, &AMOUNT_FIELDS)
        .and_then(parse_amount)
        .unwrap_or(0.0);

    let category = lookup(row, &CATEGORY_FIELDS)
        .map(|v| v.to_string().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());

    Transaction {
        amount,
        category,
        fields: row.clone(),
    }
}

/// First non-empty match among the exact names, then any case-insensitive match
fn lookup<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a CellValue> {
    names
        .iter()
        .filter_map(|name| row.get(name))
        .find(|v| !v.is_empty())
        .or_else(|| {
            row.get_ignore_case(names[0])
                .filter(|v| !v.is_empty())
        })
}

/// Read a cell as a signed amount
///
/// Accepts plain numbers, `$1,234.50` and accounting negatives `(12.50)`.
pub fn parse_amount(value: &CellValue) -> Option<f64> {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_amount_str(s),
        CellValue::Empty => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_amount_str(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, s),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();

    let n: f64 = cleaned.parse().ok()?;
    Some(if negative { -n.abs() } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (*k, CellValue::from_text(v)))
            .collect()
    }

    #[test]
    fn test_canonical_fields() {
        let tx = normalize_row(&row(&[("Amount", "150"), ("Category", "Salary")]));
        assert_eq!(tx.amount, 150.0);
        assert_eq!(tx.category, "Salary");
    }

    #[test]
    fn test_lowercase_alias() {
        let tx = normalize_row(&row(&[("amount", "-42.5"), ("category", "Food")]));
        assert_eq!(tx.amount, -42.5);
        assert_eq!(tx.category, "Food");
    }

    #[test]
    fn test_other_casing() {
        let tx = normalize_row(&row(&[("AMOUNT", "7"), (" Category ", "Gifts")]));
        assert_eq!(tx.amount, 7.0);
        assert_eq!(tx.category, "Gifts");
    }

    #[test]
    fn test_canonical_name_wins() {
        let tx = normalize_row(&row(&[("amount", "1"), ("Amount", "2")]));
        assert_eq!(tx.amount, 2.0);
    }

    #[test]
    fn test_missing_category() {
        let tx = normalize_row(&row(&[("Amount", "150")]));
        assert_eq!(tx.category, UNCATEGORIZED);

        let tx = normalize_row(&row(&[("Amount", "150"), ("Category", "  ")]));
        assert_eq!(tx.category, UNCATEGORIZED);
    }

    #[test]
    fn test_missing_or_bad_amount_is_zero() {
        assert_eq!(normalize_row(&row(&[("Category", "Rent")])).amount, 0.0);
        assert_eq!(normalize_row(&row(&[("Amount", "abc")])).amount, 0.0);
        assert_eq!(normalize_row(&row(&[("Amount", "")])).amount, 0.0);
        assert_eq!(normalize_row(&row(&[("Amount", "NaN")])).amount, 0.0);
        assert_eq!(normalize_row(&row(&[("Amount", "inf")])).amount, 0.0);
    }

    #[test]
    fn test_formatted_amounts() {
        assert_eq!(parse_amount(&CellValue::from_text("$1,234.50")), Some(1234.5));
        assert_eq!(parse_amount(&CellValue::from_text("-$20")), Some(-20.0));
        assert_eq!(parse_amount(&CellValue::from_text("(12.50)")), Some(-12.5));
        assert_eq!(parse_amount(&CellValue::Number(3.25)), Some(3.25));
    }

    #[test]
    fn test_numeric_category_is_text() {
        let mut r = RawRow::new();
        r.insert("Amount", CellValue::Number(-5.0));
        r.insert("Category", CellValue::Number(42.0));
        let tx = normalize_row(&r);
        assert_eq!(tx.amount, -5.0);
        assert_eq!(tx.category, "42");
    }

    #[test]
    fn test_order_and_passthrough() {
        let rows = vec![
            row(&[("Amount", "1"), ("Memo", "first")]),
            row(&[("Amount", "2"), ("Memo", "second")]),
        ];
        let txs = normalize(&rows);
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].amount, 1.0);
        assert_eq!(txs[1].fields.get("Memo"), Some(&CellValue::Text("second".into())));
    }
}
