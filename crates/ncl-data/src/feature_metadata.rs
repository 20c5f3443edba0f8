//! `features.json` metadata published alongside each dataset version.

use std::collections::BTreeMap;
use std::path::Path;

use ncl_common::{NclError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// Named feature sets, e.g. "small", "medium"
    #[serde(default)]
    pub feature_sets: BTreeMap<String, Vec<String>>,

    /// Per-feature statistics, keyed by feature name
    #[serde(default)]
    pub feature_stats: BTreeMap<String, serde_json::Value>,
}

impl FeatureMetadata {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn feature_set(&self, name: &str) -> Result<&[String]> {
        self.feature_sets
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| {
                NclError::Config(format!(
                    "Unknown feature set '{}' (available: {})",
                    name,
                    self.feature_sets.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    /// Every feature that has statistics, sorted by name.
    pub fn all_features(&self) -> Vec<String> {
        self.feature_stats.keys().cloned().collect()
    }
}

impl std::str::FromStr for FeatureMetadata {
    type Err = NclError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
