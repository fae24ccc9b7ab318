//! Key-set differ: keys present in only one of the two datasets

use crate::table::RecordSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keys exclusive to each side, sorted and deduplicated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDiff {
    pub reference_only: Vec<String>,
    pub candidate_only: Vec<String>,
}

impl KeyDiff {
    /// Symmetric difference of the two key sets, sorted
    pub fn all(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .reference_only
            .iter()
            .chain(self.candidate_only.iter())
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.reference_only.len() + self.candidate_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The same diff seen from the other side
    pub fn swapped(self) -> Self {
        Self {
            reference_only: self.candidate_only,
            candidate_only: self.reference_only,
        }
    }
}

/// Compare the key columns of two datasets. Only presence matters: repeated
/// keys count once and empty keys are ignored.
pub fn diff_keys(reference: &RecordSet, candidate: &RecordSet) -> KeyDiff {
    let left: BTreeSet<&str> = reference.keys().collect();
    let right: BTreeSet<&str> = candidate.keys().collect();

    let diff = KeyDiff {
        reference_only: left.difference(&right).map(|k| k.to_string()).collect(),
        candidate_only: right.difference(&left).map(|k| k.to_string()).collect(),
    };

    tracing::debug!(
        reference_only = diff.reference_only.len(),
        candidate_only = diff.candidate_only.len(),
        "diffed key sets"
    );

    diff
}
