//! Report builder: runs filter, engine and key differ, and assembles the
//! exportable result
//!
//! Output columns are ordered key, origin, differing fields (when enabled),
//! then the remaining data columns in their original order.

use crate::config::ReconConfig;
use crate::engine::{reconcile, DuplicateKey, EngineOptions, PairedRow};
use crate::error::{Error, Result};
use crate::filter::AttributeFilter;
use crate::keys::diff_keys;
use crate::table::{Origin, RecordSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Delimiter between names in the differing-fields column
pub const FIELD_DELIMITER: &str = "|";

/// One row of the exported table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportRow {
    /// A discrepant row; `values` follows the report header
    Record {
        origin: Origin,
        key: String,
        values: Vec<String>,
    },
    /// Blank row between key blocks
    Separator,
}

impl ReportRow {
    /// Cell text at a header position; separators are empty everywhere
    pub fn value(&self, index: usize) -> Option<&str> {
        match self {
            ReportRow::Record { values, .. } => values.get(index).map(String::as_str),
            ReportRow::Separator => Some(""),
        }
    }
}

/// Final result of one comparison
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// Output column names
    pub header: Vec<String>,
    /// Paired discrepant rows with blank separators
    pub rows: Vec<ReportRow>,
    pub discrepant_count: usize,
    pub identical_count: usize,
    /// Keys present in exactly one dataset, sorted
    pub unique_keys: Vec<String>,
    pub reference_only_keys: Vec<String>,
    pub candidate_only_keys: Vec<String>,
    pub duplicate_keys: Vec<DuplicateKey>,
    /// Rows skipped because their key cell was empty
    pub unkeyed_rows: usize,
    /// Rows whose key occurs exactly once across both datasets
    pub exclusive_rows: usize,
    pub reference_rows: usize,
    pub candidate_rows: usize,
    /// Rows with at least one non-empty cell
    pub reference_filled_rows: usize,
    pub candidate_filled_rows: usize,
    #[serde(skip)]
    pub elapsed: Duration,
    pub generated_at: DateTime<Utc>,
}

/// Counters and key lists without the row data
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary<'a> {
    pub discrepant_rows: usize,
    pub identical_rows: usize,
    pub discrepant_keys: usize,
    pub unique_keys: &'a [String],
    pub reference_only_keys: &'a [String],
    pub candidate_only_keys: &'a [String],
    pub duplicate_keys: &'a [DuplicateKey],
    pub unkeyed_rows: usize,
    pub reference_rows: usize,
    pub candidate_rows: usize,
    pub reference_filled_rows: usize,
    pub candidate_filled_rows: usize,
    pub filled_row_difference: usize,
    pub output_rows: usize,
    pub output_columns: usize,
    pub elapsed_seconds: f64,
    pub generated_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// Total number of cells in the exported table, for callers that cap
    /// how much they render
    pub fn output_size(&self) -> usize {
        self.rows.len() * self.header.len()
    }

    /// Number of keys with a discrepancy
    pub fn discrepant_key_count(&self) -> usize {
        self.rows.iter().filter(|r| matches!(r, ReportRow::Separator)).count()
    }

    /// Absolute difference between the filled row counts of the inputs
    pub fn filled_row_difference(&self) -> usize {
        self.reference_filled_rows.abs_diff(self.candidate_filled_rows)
    }

    pub fn has_discrepancies(&self) -> bool {
        self.discrepant_count > 0
    }

    pub fn summary(&self) -> ReportSummary<'_> {
        ReportSummary {
            discrepant_rows: self.discrepant_count,
            identical_rows: self.identical_count,
            discrepant_keys: self.discrepant_key_count(),
            unique_keys: &self.unique_keys,
            reference_only_keys: &self.reference_only_keys,
            candidate_only_keys: &self.candidate_only_keys,
            duplicate_keys: &self.duplicate_keys,
            unkeyed_rows: self.unkeyed_rows,
            reference_rows: self.reference_rows,
            candidate_rows: self.candidate_rows,
            reference_filled_rows: self.reference_filled_rows,
            candidate_filled_rows: self.candidate_filled_rows,
            filled_row_difference: self.filled_row_difference(),
            output_rows: self.rows.len(),
            output_columns: self.header.len(),
            elapsed_seconds: self.elapsed.as_secs_f64(),
            generated_at: self.generated_at,
        }
    }

    /// Write the paired rows as CSV: header first, no index column, blank
    /// separator rows fully empty
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let path = Path::new("<output>");
        let csv_err = |e: csv::Error| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        };

        csv_writer.write_record(&self.header).map_err(csv_err)?;
        let blank = vec![""; self.header.len()];
        for row in &self.rows {
            let written = match row {
                ReportRow::Record { values, .. } => csv_writer.write_record(values),
                ReportRow::Separator => csv_writer.write_record(&blank),
            };
            written.map_err(csv_err)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// The CSV export as a string
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        csv_text(buf)
    }

    /// Write the CSV export to a file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_csv(BufWriter::new(file))
    }
}

fn csv_text(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Reconcile two datasets end to end.
///
/// Applies `filter` to both inputs, aligns candidate column order to the
/// reference when configured, then runs the engine and the key differ.
pub fn build_report(
    reference: &RecordSet,
    candidate: &RecordSet,
    filter: Option<&AttributeFilter>,
    config: &ReconConfig,
) -> Result<ReconciliationReport> {
    let (reference, candidate): (Cow<RecordSet>, Cow<RecordSet>) = match filter {
        Some(filter) => (
            Cow::Owned(filter.apply(reference)?),
            Cow::Owned(filter.apply(candidate)?),
        ),
        None => (Cow::Borrowed(reference), Cow::Borrowed(candidate)),
    };

    let candidate = if config.align_columns {
        align_columns(&reference, candidate)
    } else {
        candidate
    };

    check_reserved_columns(&reference, config)?;

    let start = Instant::now();
    let engine_options = EngineOptions {
        differing_fields: config.differing_fields,
    };
    let result = reconcile(&reference, &candidate, &engine_options)?;
    let key_diff = diff_keys(&reference, &candidate);
    let elapsed = start.elapsed();

    let mut header = vec![
        result.columns[result.key_index].clone(),
        config.origin_column.clone(),
    ];
    if config.differing_fields {
        header.push(config.differing_fields_column.clone());
    }
    let data_columns: Vec<usize> = (0..result.columns.len())
        .filter(|&i| i != result.key_index)
        .collect();
    header.extend(data_columns.iter().map(|&i| result.columns[i].clone()));

    let rows: Vec<ReportRow> = result
        .rows
        .into_iter()
        .map(|row| match row {
            PairedRow::Record {
                origin,
                key,
                cells,
                differing_fields,
            } => {
                let mut values = Vec::with_capacity(header.len());
                values.push(key.clone());
                values.push(config.labels.label(origin).to_string());
                if config.differing_fields {
                    values.push(differing_fields.join(FIELD_DELIMITER));
                }
                values.extend(data_columns.iter().map(|&i| cells[i].to_string_value()));
                ReportRow::Record {
                    origin,
                    key,
                    values,
                }
            }
            PairedRow::Separator => ReportRow::Separator,
        })
        .collect();

    let report = ReconciliationReport {
        header,
        rows,
        discrepant_count: result.discrepant_count,
        identical_count: result.identical_count,
        unique_keys: key_diff.all(),
        reference_only_keys: key_diff.reference_only,
        candidate_only_keys: key_diff.candidate_only,
        duplicate_keys: result.duplicate_keys,
        unkeyed_rows: result.unkeyed_rows,
        exclusive_rows: result.exclusive_rows,
        reference_rows: reference.row_count(),
        candidate_rows: candidate.row_count(),
        reference_filled_rows: reference.filled_row_count(),
        candidate_filled_rows: candidate.filled_row_count(),
        elapsed,
        generated_at: Utc::now(),
    };

    tracing::info!(
        discrepant = report.discrepant_count,
        identical = report.identical_count,
        unique_keys = report.unique_keys.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "reconciliation finished"
    );

    Ok(report)
}

/// Put candidate columns in reference order when both hold the same columns
fn align_columns<'a>(reference: &RecordSet, candidate: Cow<'a, RecordSet>) -> Cow<'a, RecordSet> {
    let order = reference.column_names();
    if candidate.column_names() == order {
        return candidate;
    }
    match candidate.reordered(&order) {
        Some(aligned) => {
            tracing::debug!(
                dataset = %candidate.name,
                "aligned candidate columns to reference order"
            );
            Cow::Owned(aligned)
        }
        // Left as is; the engine reports the mismatch
        None => candidate,
    }
}

fn check_reserved_columns(set: &RecordSet, config: &ReconConfig) -> Result<()> {
    let mut reserved = vec![config.origin_column.as_str()];
    if config.differing_fields {
        reserved.push(config.differing_fields_column.as_str());
    }
    for column in &set.columns {
        if let Some(name) = reserved.iter().find(|r| r.eq_ignore_ascii_case(&column.name)) {
            return Err(Error::ColumnConflict {
                column: name.to_string(),
            });
        }
    }
    Ok(())
}
