//! Analysis result construction and validation
//!
//! Remote payloads and the local engine both go through
//! `AnalysisResult::new`, which derives net cash flow and savings rate
//! from the totals. Remote payloads are validated first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AnalysisError;
use crate::models::{ChartSeries, Metrics, ResultSource, NO_CATEGORY};

/// Canonical analysis output shared by every producer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    summary: String,
    suggestions: Vec<String>,
    metrics: Metrics,
    chart_series: Option<ChartSeries>,
    source: ResultSource,
}

/// Inputs to `AnalysisResult::new`
#[derive(Debug, Clone, Default)]
pub struct ResultParts {
    pub summary: String,
    pub suggestions: Vec<String>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub top_expense_category: Option<String>,
    pub chart_series: Option<ChartSeries>,
}

impl ResultParts {
    /// Reject totals and chart points that cannot be displayed
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("totalIncome", self.total_income),
            ("totalExpenses", self.total_expenses),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::MalformedResponse(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if let Some(series) = &self.chart_series {
            let periods_ok = series
                .income_expense_by_period
                .iter()
                .all(|p| p.income.is_finite() && p.expenses.is_finite());
            let shares_ok = series
                .expense_share_by_category
                .iter()
                .all(|s| s.value.is_finite());
            if !periods_ok || !shares_ok {
                return Err(AnalysisError::MalformedResponse(
                    "chart series contains non-numeric values".into(),
                ));
            }
        }

        Ok(())
    }
}

impl AnalysisResult {
    /// Build a result, deriving `netCashFlow` and `savingsRate`
    pub fn new(parts: ResultParts, source: ResultSource) -> Self {
        let net_cash_flow = parts.total_income - parts.total_expenses;
        let metrics = Metrics {
            total_income: parts.total_income,
            total_expenses: parts.total_expenses,
            net_cash_flow,
            savings_rate: savings_rate(parts.total_income, net_cash_flow),
            top_expense_category: parts
                .top_expense_category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| NO_CATEGORY.to_string()),
        };

        Self {
            summary: parts.summary,
            suggestions: parts.suggestions,
            metrics,
            chart_series: parts.chart_series,
            source,
        }
    }

    /// Validate and convert a remote "insights" object
    pub fn from_remote(value: Value, source: ResultSource) -> Result<Self, AnalysisError> {
        let insights: RemoteInsights = serde_json::from_value(value)?;
        let metrics = insights
            .metrics
            .ok_or_else(|| AnalysisError::MalformedResponse("missing metrics".into()))?;

        let total_income = metrics
            .total_income
            .ok_or_else(|| AnalysisError::MalformedResponse("missing totalIncome".into()))?;
        let total_expenses = metrics
            .total_expenses
            .ok_or_else(|| AnalysisError::MalformedResponse("missing totalExpenses".into()))?;

        let parts = ResultParts {
            summary: insights.summary.unwrap_or_default(),
            suggestions: insights.suggestions.unwrap_or_default(),
            total_income,
            total_expenses,
            top_expense_category: metrics.top_expense_category,
            chart_series: insights.chart_series,
        };
        parts.validate()?;

        let result = Self::new(parts, source);

        if let Some(net) = metrics.net_cash_flow {
            if (net - result.metrics.net_cash_flow).abs() > 0.005 {
                warn!(
                    reported = net,
                    derived = result.metrics.net_cash_flow,
                    "Remote netCashFlow disagrees with totals, using derived value"
                );
            }
        }
        if let Some(rate) = metrics.savings_rate {
            if round_percent(rate) != result.metrics.savings_rate {
                warn!(
                    reported = rate,
                    derived = result.metrics.savings_rate,
                    "Remote savingsRate disagrees with totals, using derived value"
                );
            }
        }

        Ok(result)
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn chart_series(&self) -> Option<&ChartSeries> {
        self.chart_series.as_ref()
    }

    pub fn source(&self) -> ResultSource {
        self.source
    }
}

/// Savings rate in whole percent; 0 without income
pub fn savings_rate(total_income: f64, net_cash_flow: f64) -> i64 {
    if total_income > 0.0 {
        round_percent(net_cash_flow / total_income * 100.0)
    } else {
        0
    }
}

/// Round to the nearest integer, halves toward positive infinity
pub fn round_percent(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteInsights {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
    #[serde(default)]
    metrics: Option<RemoteMetrics>,
    #[serde(default, alias = "chartData")]
    chart_series: Option<ChartSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteMetrics {
    total_income: Option<f64>,
    total_expenses: Option<f64>,
    net_cash_flow: Option<f64>,
    savings_rate: Option<f64>,
    top_expense_category: Option<String>,
}
