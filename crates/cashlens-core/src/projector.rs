//! Chart projection
//!
//! Reshapes an analysis result into the two flat series the presentation
//! layer draws. Missing or empty series are replaced by fixed six-entry
//! placeholders so a chart is never handed an empty data set.

use serde::Serialize;
use tracing::debug;

use crate::models::{CategoryShare, PeriodPoint};
use crate::result::AnalysisResult;

/// Period labels of the placeholder income/expense series
pub const PLACEHOLDER_PERIODS: [&str; 6] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun"];

/// Category labels of the placeholder expense share series
pub const PLACEHOLDER_CATEGORIES: [&str; 6] = [
    "Housing",
    "Food",
    "Transport",
    "Utilities",
    "Entertainment",
    "Other",
];

/// Chart-ready series
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub income_expense_by_period: Vec<PeriodPoint>,
    pub expense_share_by_category: Vec<CategoryShare>,
    /// True when at least one series is a placeholder
    pub placeholder: bool,
}

/// Project a result onto chart series
pub fn project(result: &AnalysisResult) -> ChartData {
    let series = result.chart_series();

    let periods = series
        .map(|s| s.income_expense_by_period.clone())
        .filter(|p| !p.is_empty());
    let shares = series
        .map(|s| s.expense_share_by_category.clone())
        .filter(|c| !c.is_empty());

    let placeholder = periods.is_none() || shares.is_none();
    if placeholder {
        debug!(
            has_series = series.is_some(),
            "Chart series incomplete, using placeholders"
        );
    }

    ChartData {
        income_expense_by_period: periods.unwrap_or_else(placeholder_periods),
        expense_share_by_category: shares.unwrap_or_else(placeholder_categories),
        placeholder,
    }
}

pub fn placeholder_periods() -> Vec<PeriodPoint> {
    PLACEHOLDER_PERIODS
        .iter()
        .map(|period| PeriodPoint {
            period: period.to_string(),
            income: 0.0,
            expenses: 0.0,
        })
        .collect()
}

pub fn placeholder_categories() -> Vec<CategoryShare> {
    PLACEHOLDER_CATEGORIES
        .iter()
        .map(|category| CategoryShare {
            category: category.to_string(),
            value: 0.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartSeries, ResultSource};
    use crate::result::ResultParts;

    fn result_with(series: Option<ChartSeries>) -> AnalysisResult {
        AnalysisResult::new(
            ResultParts {
                total_income: 10.0,
                total_expenses: 5.0,
                chart_series: series,
                ..Default::default()
            },
            ResultSource::Remote,
        )
    }

    #[test]
    fn test_passthrough() {
        let series = ChartSeries {
            income_expense_by_period: vec![PeriodPoint {
                period: "2024-01".into(),
                income: 10.0,
                expenses: 5.0,
            }],
            expense_share_by_category: vec![CategoryShare {
                category: "Food".into(),
                value: 100.0,
            }],
        };
        let charts = project(&result_with(Some(series.clone())));

        assert!(!charts.placeholder);
        assert_eq!(charts.income_expense_by_period, series.income_expense_by_period);
        assert_eq!(charts.expense_share_by_category, series.expense_share_by_category);
    }

    #[test]
    fn test_absent_series_gets_placeholders() {
        let charts = project(&result_with(None));

        assert!(charts.placeholder);
        assert_eq!(charts.income_expense_by_period.len(), 6);
        assert_eq!(charts.income_expense_by_period[0].period, "Jan");
        assert_eq!(charts.expense_share_by_category.len(), 6);
    }

    #[test]
    fn test_empty_series_replaced_individually() {
        let series = ChartSeries {
            income_expense_by_period: vec![],
            expense_share_by_category: vec![CategoryShare {
                category: "Rent".into(),
                value: 100.0,
            }],
        };
        let charts = project(&result_with(Some(series)));

        assert!(charts.placeholder);
        assert_eq!(charts.income_expense_by_period, placeholder_periods());
        assert_eq!(charts.expense_share_by_category[0].category, "Rent");
    }
}
