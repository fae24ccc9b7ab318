//! Attribute filter for narrowing dataset columns before comparison
//!
//! A filter spec maps attribute names (case-insensitive) to include/exclude
//! actions. It is usually loaded from a two-column CSV file with the headers
//! `Attribute` and `Include/Exclude`.

use crate::error::{Error, Result};
use crate::table::RecordSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const ATTRIBUTE_HEADER: &str = "attribute";
const ACTION_HEADER: &str = "include/exclude";

/// What a filter spec says about one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    Include,
    Exclude,
}

impl FromStr for FilterAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "include" => Ok(FilterAction::Include),
            "exclude" => Ok(FilterAction::Exclude),
            other => Err(format!("expected 'include' or 'exclude', found '{other}'")),
        }
    }
}

/// Whether the spec lists the columns to keep or the columns to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Keep only columns marked `Include`
    Inclusive,
    /// Keep everything except columns marked `Exclude`
    #[default]
    Exclusive,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inclusive" | "include" => Ok(FilterMode::Inclusive),
            "exclusive" | "exclude" => Ok(FilterMode::Exclusive),
            other => Err(format!("unknown filter mode '{other}'")),
        }
    }
}

/// Casing applied to the names of kept columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCase {
    Preserve,
    Lower,
}

/// Filter mode plus an optional casing override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_case: Option<ColumnCase>,
}

impl FilterOptions {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            column_case: None,
        }
    }

    /// Exclusive filtering lower-cases column names unless overridden;
    /// inclusive filtering keeps them as they are.
    pub fn effective_case(&self) -> ColumnCase {
        self.column_case.unwrap_or(match self.mode {
            FilterMode::Inclusive => ColumnCase::Preserve,
            FilterMode::Exclusive => ColumnCase::Lower,
        })
    }
}

/// Attribute name -> action, keyed by lower-cased name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    entries: BTreeMap<String, FilterAction>,
}

impl FilterSpec {
    /// Create an empty spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action for an attribute; later calls win
    pub fn insert(&mut self, attribute: &str, action: FilterAction) {
        self.entries.insert(attribute.trim().to_lowercase(), action);
    }

    /// Look up an attribute, ignoring case
    pub fn get(&self, attribute: &str) -> Option<FilterAction> {
        self.entries.get(&attribute.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, FilterAction)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (S, FilterAction)>>(iter: I) -> Self {
        let mut spec = FilterSpec::new();
        for (attribute, action) in iter {
            spec.insert(attribute.as_ref(), action);
        }
        spec
    }
}

/// A loaded spec together with how to apply it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    pub spec: FilterSpec,
    pub options: FilterOptions,
}

impl AttributeFilter {
    pub fn new(spec: FilterSpec, options: FilterOptions) -> Self {
        Self { spec, options }
    }

    /// Load the spec from a CSV file
    pub fn load<P: AsRef<Path>>(path: P, options: FilterOptions) -> Result<Self> {
        Ok(Self::new(load_filter_spec(path)?, options))
    }

    pub fn apply(&self, set: &RecordSet) -> Result<RecordSet> {
        filter_columns(set, &self.spec, &self.options)
    }
}

/// Narrow a record set's columns according to `spec`.
///
/// The key column is always kept. Spec entries naming columns that are not in
/// the data are ignored.
pub fn filter_columns(
    set: &RecordSet,
    spec: &FilterSpec,
    options: &FilterOptions,
) -> Result<RecordSet> {
    let case = options.effective_case();

    let mut indices = Vec::new();
    let mut names = Vec::new();
    for column in &set.columns {
        let keep = column.index == set.key_index()
            || match options.mode {
                FilterMode::Exclusive => spec.get(&column.name) != Some(FilterAction::Exclude),
                FilterMode::Inclusive => spec.get(&column.name) == Some(FilterAction::Include),
            };
        if !keep {
            continue;
        }
        indices.push(column.index);
        names.push(match case {
            ColumnCase::Preserve => column.name.clone(),
            ColumnCase::Lower => column.name.to_lowercase(),
        });
    }

    tracing::debug!(
        dataset = %set.name,
        mode = ?options.mode,
        kept = indices.len(),
        dropped = set.column_count() - indices.len(),
        "filtered columns"
    );

    set.project(&indices, names)
}

/// Load a filter spec from a CSV file
pub fn load_filter_spec<P: AsRef<Path>>(path: P) -> Result<FilterSpec> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_filter_spec(BufReader::new(file))
}

/// Parse a filter spec from CSV text
pub fn parse_filter_spec_str(content: &str) -> Result<FilterSpec> {
    read_filter_spec(content.as_bytes())
}

fn read_filter_spec<R: Read>(reader: R) -> Result<FilterSpec> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| Error::FilterSpec {
        line: 1,
        message: e.to_string(),
    })?;
    let find = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
            .ok_or_else(|| Error::FilterSpec {
                line: 1,
                message: format!("missing '{wanted}' header"),
            })
    };
    let attribute_idx = find(ATTRIBUTE_HEADER)?;
    let action_idx = find(ACTION_HEADER)?;

    let mut spec = FilterSpec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| Error::FilterSpec {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let attribute = record.get(attribute_idx).unwrap_or("").trim();
        if attribute.is_empty() {
            continue;
        }
        let action = record
            .get(action_idx)
            .unwrap_or("")
            .parse::<FilterAction>()
            .map_err(|message| Error::FilterSpec { line, message })?;
        spec.insert(attribute, action);
    }

    Ok(spec)
}
