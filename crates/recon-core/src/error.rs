//! Error types for recon-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in recon-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The designated key column is not present in a dataset
    #[error("key column '{column}' not found in dataset '{dataset}'")]
    MissingKeyColumn { dataset: String, column: String },

    /// Reference and candidate columns disagree after filtering
    #[error(
        "schema mismatch between datasets: only in reference {reference_only:?}, \
         only in candidate {candidate_only:?}, reordered: {reordered}"
    )]
    SchemaMismatch {
        reference_only: Vec<String>,
        candidate_only: Vec<String>,
        reordered: bool,
    },

    /// A data column collides with a column the report generates
    #[error("column '{column}' is reserved for the report output")]
    ColumnConflict { column: String },

    /// Malformed attribute filter specification
    #[error("invalid filter spec at line {line}: {message}")]
    FilterSpec { line: u64, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FileRead { .. } | Error::Io(_) => "io",
            Error::CsvParse { .. } | Error::Csv { .. } => "csv",
            Error::MissingKeyColumn { .. } => "missing_key_column",
            Error::SchemaMismatch { .. } => "configuration",
            Error::ColumnConflict { .. } => "configuration",
            Error::FilterSpec { .. } => "filter_spec",
            Error::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_column_message() {
        let err = Error::MissingKeyColumn {
            dataset: "pim.csv".to_string(),
            column: "SKU".to_string(),
        };
        assert_eq!(err.to_string(), "key column 'SKU' not found in dataset 'pim.csv'");
        assert_eq!(err.kind(), "missing_key_column");
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = Error::SchemaMismatch {
            reference_only: vec!["color".to_string()],
            candidate_only: vec![],
            reordered: false,
        };
        let msg = err.to_string();
        assert!(msg.contains("only in reference [\"color\"]"));
        assert!(msg.ends_with("reordered: false"));
        assert_eq!(err.kind(), "configuration");
    }
}
