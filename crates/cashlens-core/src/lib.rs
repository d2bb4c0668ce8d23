//! Cashlens Core Library
//!
//! Shared functionality for the cashlens ledger analysis tool:
//! - Ledger import for delimited text and spreadsheet files
//! - Transaction normalization (amount and category extraction)
//! - Remote analysis dispatch with status polling and local fallback
//! - Local metrics engine
//! - Chart projection with placeholder series
//! - Upload session state for presentation layers

pub mod config;
pub mod dispatch;
pub mod error;
pub mod import;
pub mod local;
pub mod models;
pub mod normalize;
pub mod projector;
pub mod result;
pub mod session;

/// Test utilities including mock analysis server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{DispatcherConfig, RemoteSettings, Settings};
pub use dispatch::{
    AnalysisDispatcher, AnalysisTransport, CancelToken, Clock, HttpTransport, JobSnapshot,
    TokioClock,
};
pub use error::{AnalysisError, Error, ParseError, Result};
pub use import::{load_file, parse, FileKind, FileSource, FsSource};
pub use local::compute_locally;
pub use models::{
    CategoryShare, CellValue, ChartSeries, JobStatus, Metrics, PeriodPoint, RawRow, ResultSource,
    Transaction,
};
pub use normalize::normalize;
pub use projector::{project, ChartData};
pub use result::{AnalysisResult, ResultParts};
pub use session::{Dashboard, Session};
