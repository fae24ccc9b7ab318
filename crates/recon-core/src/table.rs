//! Core table types for representing keyed CSV datasets

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which input dataset a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Reference,
    Candidate,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Reference => "reference",
            Origin::Candidate => "candidate",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyed dataset loaded from a single CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Dataset label, usually the source file path
    pub name: String,
    /// Column definitions, in file order
    pub columns: Vec<Column>,
    /// Row data; every row holds exactly one cell per column
    pub rows: Vec<Record>,
    key_index: usize,
}

impl RecordSet {
    /// Create a record set keyed on `key_column`.
    ///
    /// The key column is looked up by exact name first, then by a unique
    /// case-insensitive match (filtering may lower-case column names).
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        rows: Vec<Record>,
        key_column: &str,
    ) -> Result<Self> {
        let name = name.into();
        let key_index = match locate_column(&columns, key_column) {
            Some(index) => index,
            None => {
                return Err(Error::MissingKeyColumn {
                    dataset: name,
                    column: key_column.to_string(),
                })
            }
        };

        Ok(Self {
            name,
            columns,
            rows,
            key_index,
        })
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the key column
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    /// Name of the key column
    pub fn key_column(&self) -> &str {
        &self.columns[self.key_index].name
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column names other than the key, in order
    pub fn field_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.index != self.key_index)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The key of a row, or `None` when the key cell is empty
    pub fn key_of<'a>(&self, row: &'a Record) -> Option<&'a str> {
        row.get(self.key_index).and_then(CellValue::as_text)
    }

    /// Non-empty keys in row order, duplicates included
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().filter_map(move |r| self.key_of(r))
    }

    /// All rows carrying the given key
    pub fn find_rows(&self, key: &str) -> Vec<&Record> {
        self.rows
            .iter()
            .filter(|r| self.key_of(r) == Some(key))
            .collect()
    }

    /// Number of rows with at least one non-empty cell
    pub fn filled_row_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_blank()).count()
    }

    /// Build a new set holding only the given columns (by index, in the given
    /// order) renamed to `names`. The key column must be among them.
    pub(crate) fn project(&self, indices: &[usize], names: Vec<String>) -> Result<Self> {
        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name, i))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                Record::new(
                    indices
                        .iter()
                        .map(|&i| row.get(i).cloned().unwrap_or(CellValue::Empty))
                        .collect(),
                )
            })
            .collect();

        let key_index = indices
            .iter()
            .position(|&i| i == self.key_index)
            .ok_or_else(|| Error::MissingKeyColumn {
                dataset: self.name.clone(),
                column: self.key_column().to_string(),
            })?;

        Ok(Self {
            name: self.name.clone(),
            columns,
            rows,
            key_index,
        })
    }

    /// Reorder columns to follow `order`. Returns `None` unless `order` names
    /// exactly the columns of this set.
    pub fn reordered(&self, order: &[&str]) -> Option<Self> {
        if order.len() != self.columns.len() {
            return None;
        }
        let indices: Option<Vec<usize>> = order
            .iter()
            .map(|name| self.find_column(name).map(|c| c.index))
            .collect();
        let indices = indices?;
        let names = order.iter().map(|n| n.to_string()).collect();
        self.project(&indices, names).ok()
    }
}

/// Find a column by exact name, then by unique case-insensitive name
fn locate_column(columns: &[Column], name: &str) -> Option<usize> {
    if let Some(col) = columns.iter().find(|c| c.name == name) {
        return Some(col.index);
    }
    let lowered = name.to_lowercase();
    let mut matches = columns.iter().filter(|c| c.name.to_lowercase() == lowered);
    match (matches.next(), matches.next()) {
        (Some(col), None) => Some(col.index),
        _ => None,
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as it appears in the header
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Record {
    /// Create a new row
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }

    /// True when every cell is empty
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

/// A cell value. CSV carries no types, so every present value is text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellValue {
    /// Text value, kept exactly as read
    Text(String),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Wrap a raw field; an empty field becomes `Empty`
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The text, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Empty => None,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.as_text().unwrap_or_default().to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text().unwrap_or_default())
    }
}
