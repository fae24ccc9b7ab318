//! Run configuration for a comparison
//!
//! Stored as JSON so a comparison can be repeated with the same settings.

use crate::error::{Error, Result};
use crate::filter::{AttributeFilter, FilterOptions};
use crate::table::Origin;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Column identifying a record in both datasets
    pub key_column: String,
    /// Optional attribute filter applied to both datasets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    /// Emit the differing-fields column
    #[serde(default = "default_true")]
    pub differing_fields: bool,
    /// Reorder candidate columns to match the reference when only the order
    /// differs
    #[serde(default = "default_true")]
    pub align_columns: bool,
    /// Values written to the origin column
    #[serde(default)]
    pub labels: OriginLabels,
    /// Name of the generated origin column
    #[serde(default = "default_origin_column")]
    pub origin_column: String,
    /// Name of the generated differing-fields column
    #[serde(default = "default_differing_fields_column")]
    pub differing_fields_column: String,
}

fn default_true() -> bool {
    true
}

fn default_origin_column() -> String {
    "source".to_string()
}

fn default_differing_fields_column() -> String {
    "differing_fields".to_string()
}

impl ReconConfig {
    /// Create a config with defaults for everything but the key
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            filter: None,
            differing_fields: true,
            align_columns: true,
            labels: OriginLabels::default(),
            origin_column: default_origin_column(),
            differing_fields_column: default_differing_fields_column(),
        }
    }

    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load the configured filter spec, if any. A relative spec path is
    /// resolved against `base_dir`.
    pub fn load_filter(&self, base_dir: Option<&Path>) -> Result<Option<AttributeFilter>> {
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        let path = match base_dir {
            Some(dir) if filter.spec_path.is_relative() => dir.join(&filter.spec_path),
            _ => filter.spec_path.clone(),
        };
        AttributeFilter::load(path, filter.options).map(Some)
    }
}

/// Where the filter spec lives and how to apply it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// CSV file with `Attribute` and `Include/Exclude` columns
    pub spec_path: PathBuf,
    #[serde(flatten)]
    pub options: FilterOptions,
}

/// Text written in the origin column for each dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginLabels {
    pub reference: String,
    pub candidate: String,
}

impl Default for OriginLabels {
    fn default() -> Self {
        Self {
            reference: "REFERENCE".to_string(),
            candidate: "CANDIDATE".to_string(),
        }
    }
}

impl OriginLabels {
    pub fn label(&self, origin: Origin) -> &str {
        match origin {
            Origin::Reference => &self.reference,
            Origin::Candidate => &self.candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ColumnCase, FilterAction, FilterMode};
    use std::io::Write;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: ReconConfig =
            serde_json::from_str(r#"{"key_column": "Material Bank SKU"}"#).unwrap();

        assert_eq!(config, ReconConfig::new("Material Bank SKU"));
        assert!(config.differing_fields);
        assert!(config.align_columns);
        assert_eq!(config.origin_column, "source");
        assert_eq!(config.labels.label(Origin::Candidate), "CANDIDATE");
    }

    #[test]
    fn test_filter_config_json() {
        let json = r#"{
            "key_column": "sku",
            "filter": {"spec_path": "attrs.csv", "mode": "inclusive", "column_case": "lower"},
            "labels": {"reference": "PIM", "candidate": "CI"}
        }"#;
        let config: ReconConfig = serde_json::from_str(json).unwrap();

        let filter = config.filter.as_ref().unwrap();
        assert_eq!(filter.spec_path, PathBuf::from("attrs.csv"));
        assert_eq!(filter.options.mode, FilterMode::Inclusive);
        assert_eq!(filter.options.column_case, Some(ColumnCase::Lower));
        assert_eq!(config.labels.label(Origin::Reference), "PIM");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recon.json");

        let mut config = ReconConfig::new("sku");
        config.differing_fields = false;
        config.save(&path).unwrap();

        let loaded = ReconConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_filter_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = std::fs::File::create(dir.path().join("attrs.csv")).unwrap();
        write!(spec, "Attribute,Include/Exclude\nweight,exclude\n").unwrap();

        let mut config = ReconConfig::new("sku");
        assert!(config.load_filter(Some(dir.path())).unwrap().is_none());

        config.filter = Some(FilterConfig {
            spec_path: PathBuf::from("attrs.csv"),
            options: FilterOptions::new(FilterMode::Exclusive),
        });
        let filter = config.load_filter(Some(dir.path())).unwrap().unwrap();
        assert_eq!(filter.spec.get("Weight"), Some(FilterAction::Exclude));
    }

    #[test]
    fn test_load_missing_config() {
        let err = ReconConfig::load("/no/such/recon.json").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
