//! Upload session
//!
//! One upload cycle as the presentation layer sees it: load a file, build
//! the dashboard, clear. Holds a single error slot; a dashboard and an
//! error are never present at the same time.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::dispatch::{AnalysisDispatcher, CancelToken};
use crate::error::{AnalysisError, Error, Result};
use crate::import::{load_file, FileSource, FsSource};
use crate::local::compute_locally;
use crate::models::{Metrics, ResultSource, Transaction};
use crate::normalize::normalize;
use crate::projector::{project, ChartData};
use crate::result::AnalysisResult;

/// Rows shown in the transaction preview table
pub const PREVIEW_ROWS: usize = 5;

/// Everything the presentation layer renders after a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub preview: Vec<Transaction>,
    pub transaction_count: usize,
    pub metrics: Metrics,
    pub summary: String,
    pub suggestions: Vec<String>,
    pub charts: ChartData,
    pub source: ResultSource,
}

impl Dashboard {
    pub fn assemble(transactions: &[Transaction], result: &AnalysisResult) -> Self {
        Self {
            preview: transactions.iter().take(PREVIEW_ROWS).cloned().collect(),
            transaction_count: transactions.len(),
            metrics: result.metrics().clone(),
            summary: result.summary().to_string(),
            suggestions: result.suggestions().to_vec(),
            charts: project(result),
            source: result.source(),
        }
    }

    /// Column labels of the preview table, taken from the first row
    pub fn columns(&self) -> Vec<&str> {
        self.preview
            .first()
            .map(|tx| tx.fields.columns().collect())
            .unwrap_or_default()
    }
}

/// State of one upload cycle
pub struct Session<S: FileSource = FsSource> {
    source: S,
    dispatcher: Option<Arc<AnalysisDispatcher>>,
    transactions: Option<Vec<Transaction>>,
    dashboard: Option<Dashboard>,
    error: Option<String>,
}

impl Session<FsSource> {
    /// Session reading from the filesystem; `None` analyzes locally only
    pub fn new(dispatcher: Option<Arc<AnalysisDispatcher>>) -> Self {
        Self::with_source(FsSource, dispatcher)
    }
}

impl<S: FileSource> Session<S> {
    pub fn with_source(source: S, dispatcher: Option<Arc<AnalysisDispatcher>>) -> Self {
        Self {
            source,
            dispatcher,
            transactions: None,
            dashboard: None,
            error: None,
        }
    }

    /// Parse and normalize a file, replacing any previous upload
    pub async fn load(&mut self, path: &Path) -> Result<usize> {
        self.clear();

        match load_file(&self.source, path).await {
            Ok(rows) => {
                let transactions = normalize(&rows);
                let count = transactions.len();
                info!(path = %path.display(), count, "Loaded transactions");
                self.transactions = Some(transactions);
                Ok(count)
            }
            Err(e) => Err(self.record_error(e.into())),
        }
    }

    /// Analyze the loaded transactions and build the dashboard
    pub async fn create_dashboard(&mut self, cancel: &CancelToken) -> Result<&Dashboard> {
        self.dashboard = None;
        self.error = None;

        let transactions = match self.transactions.as_deref() {
            Some(txs) if !txs.is_empty() => txs,
            _ => return Err(self.record_error(AnalysisError::NoData.into())),
        };

        let analysis = match &self.dispatcher {
            Some(dispatcher) => dispatcher.analyze(transactions, cancel).await,
            None => Ok(compute_locally(transactions)),
        };

        match analysis {
            Ok(result) => {
                let dashboard = Dashboard::assemble(transactions, &result);
                Ok(&*self.dashboard.insert(dashboard))
            }
            Err(e) => Err(self.record_error(e.into())),
        }
    }

    /// Drop all state and cancel any in-flight analysis
    pub fn clear(&mut self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.clear();
        }
        self.transactions = None;
        self.dashboard = None;
        self.error = None;
    }

    pub fn transactions(&self) -> Option<&[Transaction]> {
        self.transactions.as_deref()
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    /// Text of the single user-visible error slot
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dispatcher(&self) -> Option<&Arc<AnalysisDispatcher>> {
        self.dispatcher.as_ref()
    }

    fn record_error(&mut self, error: Error) -> Error {
        warn!(error = %error, "Upload cycle failed");
        self.dashboard = None;
        self.error = Some(error.to_string());
        error
    }
}
