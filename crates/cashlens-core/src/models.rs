//! Data models for cashlens

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Category assigned when a row carries none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Top expense category reported when there are no expenses
pub const NO_CATEGORY: &str = "None";

/// A single cell as read from the input file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Build a cell from raw text, mapping blank text to `Empty`
    pub fn from_text(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Empty => Ok(()),
        }
    }
}

/// One parsed input row: column label to cell, in file column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell, replacing the value of an existing column with the same label
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Exact-label lookup
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Lookup ignoring ASCII case and surrounding whitespace of the label
    pub fn get_ignore_case(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c.trim().eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every cell is empty (blank spreadsheet rows)
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_empty())
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Canonical normalized transaction
///
/// `amount` is signed: positive is income, negative is expense.
/// Serializes as the original row so remote services and previews see
/// exactly what the user uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub amount: f64,
    pub category: String,
    pub fields: RawRow,
}

impl Transaction {
    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Headline numbers of an analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
    /// Whole percent
    pub savings_rate: i64,
    pub top_expense_category: String,
}

/// Income and expenses for one time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodPoint {
    #[serde(alias = "name")]
    pub period: String,
    #[serde(default)]
    pub income: f64,
    #[serde(default)]
    pub expenses: f64,
}

/// Share of expenses for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    #[serde(alias = "name")]
    pub category: String,
    #[serde(default)]
    pub value: f64,
}

/// Chart-ready aggregates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    #[serde(default, alias = "monthlyTrends")]
    pub income_expense_by_period: Vec<PeriodPoint>,
    #[serde(default, alias = "expensesByCategory")]
    pub expense_share_by_category: Vec<CategoryShare>,
}

/// Which path produced an analysis result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Remote service answered the initial request directly
    Remote,
    /// Remote service completed an asynchronous job
    RemotePolled,
    /// Computed locally after the remote path failed or was skipped
    LocalFallback,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Remote => "remote",
            ResultSource::RemotePolled => "remote_polled",
            ResultSource::LocalFallback => "local_fallback",
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_preserves_column_order() {
        let row: RawRow = vec![
            ("Date", CellValue::from_text("2024-01-01")),
            ("Amount", CellValue::Number(-12.5)),
            ("Category", CellValue::Empty),
        ]
        .into_iter()
        .collect();

        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, vec!["Date", "Amount", "Category"]);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Date":"2024-01-01","Amount":-12.5,"Category":null}"#);
    }

    #[test]
    fn test_raw_row_case_insensitive_lookup() {
        let mut row = RawRow::new();
        row.insert(" AMOUNT ", CellValue::from_text("5"));

        assert!(row.get("Amount").is_none());
        assert_eq!(
            row.get_ignore_case("amount"),
            Some(&CellValue::Text("5".into()))
        );
    }

    #[test]
    fn test_blank_row() {
        let row: RawRow = vec![("A", CellValue::Empty), ("B", CellValue::from_text("  "))]
            .into_iter()
            .collect();
        assert!(row.is_blank());
    }

    #[test]
    fn test_chart_series_accepts_legacy_names() {
        let json = r#"{
            "monthlyTrends": [{"name": "Jan", "income": 100, "expenses": 40}],
            "expensesByCategory": [{"name": "Rent", "value": 40}]
        }"#;
        let series: ChartSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.income_expense_by_period[0].period, "Jan");
        assert_eq!(series.expense_share_by_category[0].category, "Rent");
    }

    #[test]
    fn test_result_source_names() {
        assert_eq!(ResultSource::LocalFallback.as_str(), "local_fallback");
        assert_eq!(
            serde_json::to_value(ResultSource::LocalFallback).unwrap(),
            "local_fallback"
        );
        assert_eq!(
            serde_json::to_value(ResultSource::RemotePolled).unwrap(),
            "remote_polled"
        );
    }
}
