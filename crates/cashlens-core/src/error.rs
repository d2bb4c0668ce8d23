//! Error types for cashlens

use thiserror::Error;

/// Failures while turning a file into raw rows
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unsupported file format: {0} (expected .csv, .tsv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("Malformed file content: {0}")]
    MalformedContent(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        ParseError::MalformedContent(e.to_string())
    }
}

impl From<calamine::Error> for ParseError {
    fn from(e: calamine::Error) -> Self {
        ParseError::MalformedContent(e.to_string())
    }
}

/// Failures while producing an analysis result
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No data to process")]
    NoData,

    #[error("Analysis service unreachable: {0}")]
    TransportFailure(String),

    #[error("Invalid response from analysis service: {0}")]
    MalformedResponse(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AnalysisError::MalformedResponse(e.to_string())
        } else {
            AnalysisError::TransportFailure(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::MalformedResponse(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
