//! recon-core: Core library for reconciling two keyed CSV datasets
//!
//! This library provides functionality to:
//! - Parse CSV files into keyed record sets, keeping every value as text
//! - Narrow columns with an include/exclude attribute filter
//! - Pair reference and candidate rows by key and classify them as
//!   identical or discrepant
//! - Report keys present in only one dataset
//! - Assemble an ordered, exportable report (CSV and JSON summary)

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod keys;
pub mod parser;
pub mod report;
pub mod table;

pub use config::{FilterConfig, OriginLabels, ReconConfig};
pub use engine::{reconcile, DuplicateKey, EngineOptions, PairedRow, Reconciliation};
pub use error::{Error, Result};
pub use filter::{
    filter_columns, load_filter_spec, parse_filter_spec_str, AttributeFilter, ColumnCase,
    FilterAction, FilterMode, FilterOptions, FilterSpec,
};
pub use keys::{diff_keys, KeyDiff};
pub use parser::{parse_csv, parse_csv_str};
pub use report::{build_report, ReconciliationReport, ReportRow, ReportSummary, FIELD_DELIMITER};
pub use table::{CellValue, Column, Origin, Record, RecordSet};
