//! Local metrics engine
//!
//! Deterministic fallback that derives the same result shape the remote
//! service produces. No date bucketing is done here: the period series is
//! left empty and charts fall back to the placeholder periods.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{CategoryShare, ChartSeries, ResultSource, Transaction, NO_CATEGORY};
use crate::result::{round_percent, savings_rate, AnalysisResult, ResultParts};

/// Expense totals per category in first-seen order
#[derive(Debug, Default)]
struct CategoryTotals {
    order: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl CategoryTotals {
    fn add(&mut self, category: &str, amount: f64) {
        match self.index.get(category) {
            Some(&i) => self.order[i].1 += amount,
            None => {
                self.index.insert(category.to_string(), self.order.len());
                self.order.push((category.to_string(), amount));
            }
        }
    }

    /// Largest total; ties go to the category seen first
    fn top(&self) -> Option<&str> {
        let mut best: Option<&(String, f64)> = None;
        for entry in &self.order {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(c, _)| c.as_str())
    }

    /// Integer percentage shares of the total
    fn shares(&self, total: f64) -> Vec<CategoryShare> {
        if total <= 0.0 {
            return Vec::new();
        }
        self.order
            .iter()
            .map(|(category, value)| CategoryShare {
                category: category.clone(),
                value: round_percent(value / total * 100.0) as f64,
            })
            .collect()
    }
}

/// Compute an analysis result without any remote call
pub fn compute_locally(transactions: &[Transaction]) -> AnalysisResult {
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    let mut categories = CategoryTotals::default();

    for tx in transactions {
        if tx.is_income() {
            total_income += tx.amount;
        } else if tx.is_expense() {
            let magnitude = tx.amount.abs();
            total_expenses += magnitude;
            categories.add(&tx.category, magnitude);
        }
    }

    let top = categories.top().unwrap_or(NO_CATEGORY).to_string();
    let rate = savings_rate(total_income, total_income - total_expenses);

    let chart_series = ChartSeries {
        income_expense_by_period: Vec::new(),
        expense_share_by_category: categories.shares(total_expenses),
    };

    let result = AnalysisResult::new(
        ResultParts {
            summary: summary_text(rate, &top),
            suggestions: suggestion_texts(rate, &top),
            total_income,
            total_expenses,
            top_expense_category: Some(top),
            chart_series: Some(chart_series),
        },
        ResultSource::LocalFallback,
    );

    debug!(
        transactions = transactions.len(),
        total_income,
        total_expenses,
        savings_rate = result.metrics().savings_rate,
        "Computed local metrics"
    );

    result
}

fn summary_text(savings_rate: i64, top_category: &str) -> String {
    format!(
        "Your savings rate is {}%. Your largest expense category is {}.",
        savings_rate, top_category
    )
}

fn suggestion_texts(savings_rate: i64, top_category: &str) -> Vec<String> {
    vec![
        format!("Review your {} spending for potential savings.", top_category),
        format!(
            "Set a monthly budget to lift your savings rate above {}%.",
            savings_rate
        ),
        "Build an emergency fund covering three to six months of expenses.".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRow;
    use crate::projector::{placeholder_periods, project};

    fn tx(amount: f64, category: &str) -> Transaction {
        Transaction {
            amount,
            category: category.to_string(),
            fields: RawRow::new(),
        }
    }

    #[test]
    fn test_reference_ledger() {
        let txs = vec![tx(1000.0, "Salary"), tx(-400.0, "Rent"), tx(-100.0, "Food")];
        let result = compute_locally(&txs);
        let m = result.metrics();

        assert_eq!(m.total_income, 1000.0);
        assert_eq!(m.total_expenses, 500.0);
        assert_eq!(m.net_cash_flow, 500.0);
        assert_eq!(m.savings_rate, 50);
        assert_eq!(m.top_expense_category, "Rent");
        assert_eq!(result.source(), ResultSource::LocalFallback);
    }

    #[test]
    fn test_invariants_hold() {
        let ledgers = vec![
            vec![tx(-10.0, "A")],
            vec![tx(5.0, "A"), tx(-7.5, "B"), tx(0.0, "C")],
            vec![tx(123.45, "Pay"), tx(-23.45, "Food"), tx(-100.0, "Rent")],
        ];
        for txs in ledgers {
            let m = compute_locally(&txs).metrics().clone();
            assert!(m.total_income >= 0.0);
            assert!(m.total_expenses >= 0.0);
            assert_eq!(m.net_cash_flow, m.total_income - m.total_expenses);
        }
    }

    #[test]
    fn test_no_income_no_division() {
        let result = compute_locally(&[tx(-50.0, "Food")]);
        assert_eq!(result.metrics().savings_rate, 0);
        assert_eq!(result.metrics().net_cash_flow, -50.0);
    }

    #[test]
    fn test_no_expenses() {
        let result = compute_locally(&[tx(50.0, "Salary")]);
        assert_eq!(result.metrics().top_expense_category, NO_CATEGORY);
        assert_eq!(result.metrics().savings_rate, 100);
        let series = result.chart_series().unwrap();
        assert!(series.expense_share_by_category.is_empty());
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let txs = vec![tx(-30.0, "Food"), tx(-20.0, "Rent"), tx(-10.0, "Rent")];
        let result = compute_locally(&txs);
        assert_eq!(result.metrics().top_expense_category, "Food");
    }

    #[test]
    fn test_category_shares() {
        let txs = vec![tx(-1.0, "A"), tx(-1.0, "B"), tx(-1.0, "C")];
        let series = compute_locally(&txs).chart_series().cloned().unwrap();
        let shares: Vec<_> = series
            .expense_share_by_category
            .iter()
            .map(|s| (s.category.as_str(), s.value))
            .collect();
        assert_eq!(shares, vec![("A", 33.0), ("B", 33.0), ("C", 33.0)]);

        assert!(series.income_expense_by_period.is_empty());
    }

    #[test]
    fn test_charts_use_placeholder_periods() {
        let txs = vec![tx(1000.0, "Salary"), tx(-400.0, "Rent")];
        let charts = project(&compute_locally(&txs));

        assert!(charts.placeholder);
        assert_eq!(charts.income_expense_by_period, placeholder_periods());
        assert_eq!(charts.expense_share_by_category[0].category, "Rent");
        assert_eq!(charts.expense_share_by_category[0].value, 100.0);
    }

    #[test]
    fn test_text_templates() {
        let txs = vec![tx(1000.0, "Salary"), tx(-400.0, "Rent"), tx(-100.0, "Food")];
        let result = compute_locally(&txs);
        assert_eq!(
            result.summary(),
            "Your savings rate is 50%. Your largest expense category is Rent."
        );
        assert_eq!(result.suggestions().len(), 3);
        assert!(result.suggestions()[0].contains("Rent"));
        assert!(result.suggestions()[1].contains("50%"));
    }

    #[test]
    fn test_deterministic() {
        let txs = vec![tx(10.0, "Pay"), tx(-3.0, "X"), tx(-3.0, "Y")];
        assert_eq!(compute_locally(&txs), compute_locally(&txs));
    }

    #[test]
    fn test_empty_input() {
        let result = compute_locally(&[]);
        assert_eq!(result.metrics().total_income, 0.0);
        assert_eq!(result.metrics().savings_rate, 0);
    }
}
