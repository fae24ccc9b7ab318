//! CSV parser for reference and candidate datasets

use crate::error::{Error, Result};
use crate::table::{CellValue, Column, Record, RecordSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Parse a CSV file into a RecordSet keyed on `key_column`
pub fn parse_csv<P: AsRef<Path>>(path: P, key_column: &str) -> Result<RecordSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    read_record_set(BufReader::new(file), path, key_column)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str, key_column: &str) -> Result<RecordSet> {
    read_record_set(content.as_bytes(), Path::new(source_name), key_column)
}

fn read_record_set<R: Read>(reader: R, path: &Path, key_column: &str) -> Result<RecordSet> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    // Parse headers into columns
    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.to_string(), i))
        .collect();

    if columns.is_empty() {
        return Err(Error::CsvParse {
            path: path.to_path_buf(),
            message: "no columns found in CSV".to_string(),
        });
    }

    // Parse rows
    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::parse).collect();

        // Pad with empty cells if row is shorter than header
        cells.resize(cells.len().max(columns.len()), CellValue::Empty);

        // Truncate rows longer than the header
        if cells.len() > columns.len() {
            tracing::warn!(
                row = row_idx + 1,
                path = %path.display(),
                "row has more cells than columns, truncating"
            );
            cells.truncate(columns.len());
        }

        rows.push(Record::new(cells));
    }

    tracing::debug!(
        path = %path.display(),
        columns = columns.len(),
        rows = rows.len(),
        "parsed CSV"
    );

    RecordSet::new(path.display().to_string(), columns, rows, key_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_csv() {
        let csv = "SKU,Name,Value\n1,foo,100\n2,bar,200\n";
        let table = parse_csv_str(csv, "test.csv", "SKU").unwrap();

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[0].name, "SKU");
        assert_eq!(table.columns[1].name, "Name");
        assert_eq!(table.columns[2].name, "Value");

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.key_index(), 0);
        assert_eq!(table.name, "test.csv");
    }

    #[test]
    fn test_numeric_looking_keys_stay_text() {
        let csv = "Name,SKU\nfoo,000123\nbar,1e5\n";
        let table = parse_csv_str(csv, "test.csv", "SKU").unwrap();

        assert_eq!(table.key_index(), 1);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["000123", "1e5"]);
    }

    #[test]
    fn test_parse_with_empty_cells() {
        let csv = "SKU,Name,Value\n1,,100\n2,bar,\n";
        let table = parse_csv_str(csv, "test.csv", "SKU").unwrap();

        assert_eq!(table.rows[0].cells[1], CellValue::Empty);
        assert_eq!(table.rows[1].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_parse_pads_and_truncates_rows() {
        let csv = "SKU,Name,Value\n1,foo\n2,bar,200,extra\n";
        let table = parse_csv_str(csv, "test.csv", "SKU").unwrap();

        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells[2], CellValue::Empty);
        assert_eq!(table.rows[1].cells.len(), 3);
        assert_eq!(table.rows[1].cells[2], CellValue::parse("200"));
    }

    #[test]
    fn test_parse_missing_key_column() {
        let csv = "Name,Value\nfoo,100\n";
        let err = parse_csv_str(csv, "test.csv", "SKU").unwrap_err();
        assert!(matches!(err, Error::MissingKeyColumn { .. }));
    }

    #[test]
    fn test_parse_header_only() {
        let table = parse_csv_str("SKU,Color\n", "empty.csv", "SKU").unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_parse_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SKU,Color\nA,red\n").unwrap();

        let table = parse_csv(file.path(), "SKU").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.name, file.path().display().to_string());
    }

    #[test]
    fn test_parse_csv_missing_file() {
        let err = parse_csv("/definitely/not/here.csv", "SKU").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
