//! Reconciliation engine: pairs reference and candidate rows by key
//!
//! Both datasets are tagged with their origin and walked once, reference rows
//! first. Each key collects its rows into a group together with a count of
//! every distinct row signature seen in it. Within a group of two or more
//! rows, a row is discrepant when no other row of the group is field-for-field
//! equal to it, and identical otherwise. A key held by a single row is left to
//! the key-set differ.

use crate::error::{Error, Result};
use crate::table::{CellValue, Origin, Record, RecordSet};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// Engine switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Attach the names of differing columns to every emitted row
    pub differing_fields: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            differing_fields: true,
        }
    }
}

/// One row of the paired output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairedRow {
    /// A discrepant input row
    Record {
        origin: Origin,
        key: String,
        cells: Vec<CellValue>,
        /// Columns where this key's reference and candidate rows differ
        differing_fields: Vec<String>,
    },
    /// Blank row closing a key's block
    Separator,
}

impl PairedRow {
    pub fn is_separator(&self) -> bool {
        matches!(self, PairedRow::Separator)
    }
}

/// A key that occurs more than once within one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub origin: Origin,
    pub key: String,
    pub count: usize,
}

/// Output of one engine run
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Shared column list of both inputs
    pub columns: Vec<String>,
    /// Index of the key column within `columns`
    pub key_index: usize,
    /// Discrepant rows grouped by key, each key block closed by a separator
    pub rows: Vec<PairedRow>,
    /// Rows with no field-equal counterpart in their group
    pub discrepant_count: usize,
    /// Rows with at least one field-equal counterpart in their group
    pub identical_count: usize,
    /// Keys repeated within a single dataset
    pub duplicate_keys: Vec<DuplicateKey>,
    /// Rows whose key cell is empty
    pub unkeyed_rows: usize,
    /// Rows whose key occurs exactly once across both datasets
    pub exclusive_rows: usize,
    pub elapsed: Duration,
}

impl Reconciliation {
    /// Keys with at least one discrepant row, in output order
    pub fn discrepant_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for row in &self.rows {
            if let PairedRow::Record { key, .. } = row {
                if keys.last() != Some(&key.as_str()) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

/// A row tagged with the dataset it came from
struct Tagged<'a> {
    origin: Origin,
    record: &'a Record,
}

/// All rows sharing one key, as positions into the tagged union
struct Group<'a> {
    key: &'a str,
    members: Vec<usize>,
    signatures: HashMap<&'a [CellValue], usize>,
    reference_rows: usize,
    candidate_rows: usize,
}

impl<'a> Group<'a> {
    fn new(key: &'a str) -> Self {
        Self {
            key,
            members: Vec::new(),
            signatures: HashMap::new(),
            reference_rows: 0,
            candidate_rows: 0,
        }
    }

    fn push(&mut self, position: usize, row: &Tagged<'a>) {
        self.members.push(position);
        *self.signatures.entry(row.record.cells.as_slice()).or_insert(0) += 1;
        match row.origin {
            Origin::Reference => self.reference_rows += 1,
            Origin::Candidate => self.candidate_rows += 1,
        }
    }

    fn is_unique(&self, record: &Record) -> bool {
        self.signatures.get(record.cells.as_slice()).copied() == Some(1)
    }
}

/// A group with at least one discrepant row
struct Discrepancy {
    group: usize,
    rows: Vec<usize>,
}

/// Reconcile two datasets with identical column lists.
pub fn reconcile(
    reference: &RecordSet,
    candidate: &RecordSet,
    options: &EngineOptions,
) -> Result<Reconciliation> {
    let start = Instant::now();

    check_schema(reference, candidate)?;
    let key_index = reference.key_index();
    let columns: Vec<String> = reference.columns.iter().map(|c| c.name.clone()).collect();

    let union: Vec<Tagged> = reference
        .rows
        .iter()
        .map(|record| Tagged {
            origin: Origin::Reference,
            record,
        })
        .chain(candidate.rows.iter().map(|record| Tagged {
            origin: Origin::Candidate,
            record,
        }))
        .collect();

    // Single grouping pass; signatures are counted as rows land in a group
    let mut groups: Vec<Group> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();
    let mut unkeyed_rows = 0;

    for (position, row) in union.iter().enumerate() {
        let Some(key) = row.record.get(key_index).and_then(CellValue::as_text) else {
            unkeyed_rows += 1;
            continue;
        };
        let idx = *group_index.entry(key).or_insert_with(|| {
            groups.push(Group::new(key));
            groups.len() - 1
        });
        groups[idx].push(position, row);
    }

    let mut discrepant_count = 0;
    let mut identical_count = 0;
    let mut exclusive_rows = 0;
    let mut duplicate_keys = Vec::new();
    let mut discrepancies = Vec::new();

    for (idx, group) in groups.iter().enumerate() {
        for (origin, count) in [
            (Origin::Reference, group.reference_rows),
            (Origin::Candidate, group.candidate_rows),
        ] {
            if count > 1 {
                duplicate_keys.push(DuplicateKey {
                    origin,
                    key: group.key.to_string(),
                    count,
                });
            }
        }

        if group.members.len() < 2 {
            exclusive_rows += group.members.len();
            continue;
        }

        let discrepant: Vec<usize> = group
            .members
            .iter()
            .copied()
            .filter(|&pos| group.is_unique(union[pos].record))
            .collect();

        discrepant_count += discrepant.len();
        identical_count += group.members.len() - discrepant.len();

        if !discrepant.is_empty() {
            discrepancies.push(Discrepancy {
                group: idx,
                rows: discrepant,
            });
        }
    }

    if !duplicate_keys.is_empty() {
        tracing::warn!(
            count = duplicate_keys.len(),
            "keys repeated within a dataset; rows are classified individually"
        );
        for dup in &duplicate_keys {
            tracing::debug!(
                origin = %dup.origin,
                key = %dup.key,
                count = dup.count,
                "duplicate key"
            );
        }
    }

    // Keys appear in the order of their first discrepant row
    discrepancies.sort_by_key(|d| d.rows[0]);

    let mut rows = Vec::new();
    for discrepancy in &discrepancies {
        let group = &groups[discrepancy.group];
        let differing_fields = if options.differing_fields {
            differing_fields(&union, group, &discrepancy.rows, &columns, key_index)
        } else {
            Vec::new()
        };

        for origin in [Origin::Reference, Origin::Candidate] {
            for &pos in &discrepancy.rows {
                if union[pos].origin != origin {
                    continue;
                }
                rows.push(PairedRow::Record {
                    origin,
                    key: group.key.to_string(),
                    cells: union[pos].record.cells.clone(),
                    differing_fields: differing_fields.clone(),
                });
            }
        }
        rows.push(PairedRow::Separator);
    }

    let elapsed = start.elapsed();
    tracing::debug!(
        groups = groups.len(),
        discrepant = discrepant_count,
        identical = identical_count,
        discrepant_keys = discrepancies.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "reconciled"
    );

    Ok(Reconciliation {
        columns,
        key_index,
        rows,
        discrepant_count,
        identical_count,
        duplicate_keys,
        unkeyed_rows,
        exclusive_rows,
        elapsed,
    })
}

/// Refuse to compare datasets whose columns do not line up
pub fn check_schema(reference: &RecordSet, candidate: &RecordSet) -> Result<()> {
    let left = reference.column_names();
    let right = candidate.column_names();
    if left == right {
        return Ok(());
    }

    let left_set: BTreeSet<&str> = left.iter().copied().collect();
    let right_set: BTreeSet<&str> = right.iter().copied().collect();
    let reference_only: Vec<String> = left_set
        .difference(&right_set)
        .map(|s| s.to_string())
        .collect();
    let candidate_only: Vec<String> = right_set
        .difference(&left_set)
        .map(|s| s.to_string())
        .collect();
    let reordered = reference_only.is_empty() && candidate_only.is_empty();

    Err(Error::SchemaMismatch {
        reference_only,
        candidate_only,
        reordered,
    })
}

/// Columns where a key's representative reference and candidate rows differ.
///
/// The representative of each origin is its first discrepant row, or its
/// first row in the group when that origin has no discrepant row.
fn differing_fields(
    union: &[Tagged],
    group: &Group,
    discrepant: &[usize],
    columns: &[String],
    key_index: usize,
) -> Vec<String> {
    let representative = |origin: Origin| {
        discrepant
            .iter()
            .chain(group.members.iter())
            .find(|&&pos| union[pos].origin == origin)
            .map(|&pos| union[pos].record)
    };

    let (Some(reference), Some(candidate)) =
        (representative(Origin::Reference), representative(Origin::Candidate))
    else {
        return Vec::new();
    };

    columns
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != key_index && reference.get(i) != candidate.get(i))
        .map(|(_, name)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;

    fn set(name: &str, csv: &str) -> RecordSet {
        parse_csv_str(csv, name, "key").unwrap()
    }

    fn run(reference: &str, candidate: &str) -> Reconciliation {
        reconcile(
            &set("reference.csv", reference),
            &set("candidate.csv", candidate),
            &EngineOptions::default(),
        )
        .unwrap()
    }

    fn emitted(result: &Reconciliation) -> Vec<(Origin, String)> {
        result
            .rows
            .iter()
            .filter_map(|row| match row {
                PairedRow::Record { origin, cells, .. } => {
                    let values: Vec<String> = cells.iter().map(|c| c.to_string_value()).collect();
                    Some((*origin, values.join(",")))
                }
                PairedRow::Separator => None,
            })
            .collect()
    }

    #[test]
    fn test_single_value_difference() {
        let result = run("key,color\nA,red\n", "key,color\nA,blue\n");

        assert_eq!(result.discrepant_count, 2);
        assert_eq!(result.identical_count, 0);
        assert_eq!(result.rows.len(), 3);
        assert!(result.rows[2].is_separator());
        assert_eq!(
            emitted(&result),
            vec![
                (Origin::Reference, "A,red".to_string()),
                (Origin::Candidate, "A,blue".to_string()),
            ]
        );
        match &result.rows[0] {
            PairedRow::Record { differing_fields, key, .. } => {
                assert_eq!(key, "A");
                assert_eq!(differing_fields, &vec!["color".to_string()]);
            }
            PairedRow::Separator => panic!("expected a record"),
        }
    }

    #[test]
    fn test_identical_rows() {
        let result = run("key,color\nB,red\n", "key,color\nB,red\n");

        assert_eq!(result.discrepant_count, 0);
        assert_eq!(result.identical_count, 2);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_key_only_in_reference() {
        let result = run("key,color\nC,red\n", "key,color\n");

        assert_eq!(result.discrepant_count, 0);
        assert_eq!(result.identical_count, 0);
        assert_eq!(result.exclusive_rows, 1);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_duplicate_key_with_one_match() {
        let result = run("key,color\nD,red\nD,blue\n", "key,color\nD,blue\n");

        // Only the unmatched reference row lacks a field-equal twin
        assert_eq!(result.discrepant_count, 1);
        assert_eq!(result.identical_count, 2);
        assert_eq!(emitted(&result), vec![(Origin::Reference, "D,red".to_string())]);
        assert_eq!(
            result.duplicate_keys,
            vec![DuplicateKey {
                origin: Origin::Reference,
                key: "D".to_string(),
                count: 2,
            }]
        );

        // Candidate has no discrepant row, so its first row stands in
        match &result.rows[0] {
            PairedRow::Record { differing_fields, .. } => {
                assert_eq!(differing_fields, &vec!["color".to_string()])
            }
            PairedRow::Separator => panic!("expected a record"),
        }
    }

    #[test]
    fn test_three_equal_rows_and_one_outlier() {
        let result = run(
            "key,color\nE,red\nE,red\n",
            "key,color\nE,red\nE,green\n",
        );

        assert_eq!(result.discrepant_count, 1);
        assert_eq!(result.identical_count, 3);
        assert_eq!(emitted(&result), vec![(Origin::Candidate, "E,green".to_string())]);
    }

    #[test]
    fn test_duplicates_within_origin_emitted_contiguously() {
        let result = run(
            "key,color,size\nF,red,S\nF,blue,M\n",
            "key,color,size\nF,green,S\nF,green,L\n",
        );

        assert_eq!(result.discrepant_count, 4);
        assert_eq!(
            emitted(&result),
            vec![
                (Origin::Reference, "F,red,S".to_string()),
                (Origin::Reference, "F,blue,M".to_string()),
                (Origin::Candidate, "F,green,S".to_string()),
                (Origin::Candidate, "F,green,L".to_string()),
            ]
        );
        // First-occurrence pairing: F,red,S vs F,green,S
        match &result.rows[0] {
            PairedRow::Record { differing_fields, .. } => {
                assert_eq!(differing_fields, &vec!["color".to_string()])
            }
            PairedRow::Separator => panic!("expected a record"),
        }
        assert_eq!(result.rows.iter().filter(|r| r.is_separator()).count(), 1);
    }

    #[test]
    fn test_key_order_follows_first_discrepant_row() {
        let result = run(
            "key,color\nG,red\nH,red\nI,red\n",
            "key,color\nI,blue\nG,red\nH,blue\n",
        );

        assert_eq!(result.discrepant_keys(), vec!["H", "I"]);
        assert_eq!(result.identical_count, 2);
        assert_eq!(result.discrepant_count, 4);
        assert_eq!(result.rows.len(), 6);
    }

    #[test]
    fn test_single_origin_duplicates_are_classified() {
        let result = run("key,color\nJ,red\nJ,blue\n", "key,color\nK,red\n");

        assert_eq!(result.discrepant_count, 2);
        assert_eq!(result.identical_count, 0);
        // K is the only single-row key
        assert_eq!(result.exclusive_rows, 1);
        assert_eq!(result.duplicate_keys.len(), 1);
        assert_eq!(
            emitted(&result),
            vec![
                (Origin::Reference, "J,red".to_string()),
                (Origin::Reference, "J,blue".to_string()),
            ]
        );
        assert_eq!(result.rows.len(), 3);
        assert!(result.rows[2].is_separator());

        // No candidate row to compare against
        match &result.rows[0] {
            PairedRow::Record { differing_fields, .. } => assert!(differing_fields.is_empty()),
            PairedRow::Separator => panic!("expected a record"),
        }
    }

    #[test]
    fn test_single_origin_equal_duplicates_are_identical() {
        let result = run("key,color\nJ,red\nJ,red\n", "key,color\n");

        assert_eq!(result.discrepant_count, 0);
        assert_eq!(result.identical_count, 2);
        assert_eq!(result.exclusive_rows, 0);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let result = run("key,color\n", "key,color\n");

        assert_eq!(result.discrepant_count, 0);
        assert_eq!(result.identical_count, 0);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_empty_keys_are_unkeyed() {
        let result = run("key,color\n,red\n,blue\n", "key,color\n,red\nL,red\n");

        assert_eq!(result.unkeyed_rows, 3);
        assert_eq!(result.exclusive_rows, 1);
        assert_eq!(result.discrepant_count + result.identical_count, 0);
    }

    #[test]
    fn test_empty_cells_compare_equal() {
        let result = run("key,color,size\nM,,S\n", "key,color,size\nM,,S\n");
        assert_eq!(result.identical_count, 2);
    }

    #[test]
    fn test_every_row_accounted_for_once() {
        let reference = "key,color\nA,red\nB,red\nB,blue\nC,red\n,red\nX,red\n";
        let candidate = "key,color\nA,red\nB,blue\nC,green\nY,red\nY,red\nZ,red\nZ,blue\n";
        let result = run(reference, candidate);

        // A: 2 identical; B: 1 discrepant, 2 identical; C: 2 discrepant;
        // Y: 2 identical; Z: 2 discrepant; X: exclusive; blank key: unkeyed
        assert_eq!(result.discrepant_count, 5);
        assert_eq!(result.identical_count, 6);
        assert_eq!(result.exclusive_rows, 1);
        assert_eq!(result.unkeyed_rows, 1);

        let classified = result.discrepant_count + result.identical_count;
        assert_eq!(classified + result.exclusive_rows + result.unkeyed_rows, 6 + 7);
        let emitted_rows = result.rows.iter().filter(|r| !r.is_separator()).count();
        assert_eq!(emitted_rows, result.discrepant_count);
    }

    #[test]
    fn test_deterministic_output() {
        let reference = "key,color\nA,red\nB,red\nC,red\nD,red\n";
        let candidate = "key,color\nD,blue\nC,blue\nB,blue\nA,blue\n";
        let first = run(reference, candidate);
        let second = run(reference, candidate);

        assert_eq!(first.rows, second.rows);
        assert_eq!(first.discrepant_keys(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_differing_fields_disabled() {
        let result = reconcile(
            &set("r.csv", "key,color\nA,red\n"),
            &set("c.csv", "key,color\nA,blue\n"),
            &EngineOptions {
                differing_fields: false,
            },
        )
        .unwrap();

        match &result.rows[0] {
            PairedRow::Record { differing_fields, .. } => assert!(differing_fields.is_empty()),
            PairedRow::Separator => panic!("expected a record"),
        }
    }

    #[test]
    fn test_schema_mismatch_refused() {
        let err = reconcile(
            &set("r.csv", "key,color\nA,red\n"),
            &set("c.csv", "key,size\nA,S\n"),
            &EngineOptions::default(),
        )
        .unwrap_err();

        match err {
            Error::SchemaMismatch {
                reference_only,
                candidate_only,
                reordered,
            } => {
                assert_eq!(reference_only, vec!["color".to_string()]);
                assert_eq!(candidate_only, vec!["size".to_string()]);
                assert!(!reordered);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_schema_reorder_refused() {
        let err = check_schema(
            &set("r.csv", "key,color,size\n"),
            &set("c.csv", "key,size,color\n"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { reordered: true, .. }));
    }
}
