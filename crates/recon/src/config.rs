use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::normalize::normalize_key;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Template conventions the schema inspector looks for.
///
/// Every label is compared after key normalization, so `"Item Description"`,
/// `"item_description"` and `"ITEMDESCRIPTION"` are equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub header: HeaderConfig,
    /// A sheet with one of these at the start of a word in its name is the
    /// cumulative target.
    pub cumulative_markers: Vec<String>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            header: HeaderConfig::default(),
            cumulative_markers: vec!["cumulative".into(), "cum".into(), "mtd".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Header detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Label whose cell marks the header row.
    pub primary_label: String,
    /// Tried when no cell matches `primary_label`.
    pub secondary_label: String,
    /// Header texts that identify the item-description column.
    pub item_labels: Vec<String>,
    /// How many rows from the top of the grid are searched for the header.
    pub scan_rows: usize,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            primary_label: "Item Description".into(),
            secondary_label: "Description".into(),
            item_labels: vec![
                "Item Description".into(),
                "Description".into(),
                "Item".into(),
                "Item Name".into(),
                "Product".into(),
                "Product Name".into(),
            ],
            scan_rows: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if normalize_key(&self.header.primary_label).is_empty() {
            return Err(ReconError::ConfigValidation(
                "header.primary_label must contain letters or digits".into(),
            ));
        }

        if self.header.scan_rows == 0 {
            return Err(ReconError::ConfigValidation(
                "header.scan_rows must be at least 1".into(),
            ));
        }

        if self.header.item_labels.iter().all(|l| normalize_key(l).is_empty()) {
            return Err(ReconError::ConfigValidation(
                "header.item_labels needs at least one usable label".into(),
            ));
        }

        if let Some(bad) = self
            .cumulative_markers
            .iter()
            .find(|m| normalize_key(m).is_empty())
        {
            return Err(ReconError::ConfigValidation(format!(
                "cumulative marker {bad:?} normalizes to an empty key"
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.header.scan_rows, 10);
    }

    #[test]
    fn partial_header_table() {
        let config = ReconConfig::from_toml(
            r#"
cumulative_markers = ["month to date"]

[header]
primary_label = "Product"
scan_rows = 4
"#,
        )
        .unwrap();
        assert_eq!(config.header.primary_label, "Product");
        assert_eq!(config.header.secondary_label, "Description");
        assert_eq!(config.header.scan_rows, 4);
        assert_eq!(config.cumulative_markers, vec!["month to date"]);
    }

    #[test]
    fn rejects_zero_scan_rows() {
        let err = ReconConfig::from_toml("[header]\nscan_rows = 0\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(_)));
    }

    #[test]
    fn rejects_blank_marker() {
        let err = ReconConfig::from_toml("cumulative_markers = [\"--\"]\n").unwrap_err();
        assert!(err.to_string().contains("cumulative marker"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ReconConfig::from_toml("header = 3").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
