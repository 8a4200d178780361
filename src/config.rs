//! Compile configuration

use crate::error::{FmError, FmResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// How gulsummaryxref and fmsummaryxref rows are grouped into summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryGrouping {
    /// Every row reports to summary 1
    #[default]
    Portfolio,
    /// One summary per account, numbered in first-seen order
    Account,
    /// One summary per location, numbered by row id
    Location,
}

/// Options for one compilation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Drop unknown keys and locations without accounts instead of failing
    pub allow_partial_runs: bool,

    /// Emit inactive intermediate levels as 1:1 pass-through levels
    ///
    /// Off by default: a level no record supplies terms for is left out and
    /// the remaining levels are renumbered, which is the level layout loss
    /// engines expect for these programmes (a single-location, single-layer
    /// programme with only coverage terms compiles to two levels). Turn it on
    /// to keep every FM level materialized so level ids line up across
    /// programmes of differing complexity.
    pub materialize_empty_levels: bool,

    /// Locations per parallel drafting chunk
    pub chunk_size: usize,

    pub summary_grouping: SummaryGrouping,

    /// Round coverage TIVs and fm_profile amounts when set
    pub output_decimal_places: Option<u32>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            allow_partial_runs: false,
            materialize_empty_levels: false,
            chunk_size: 100_000,
            summary_grouping: SummaryGrouping::Portfolio,
            output_decimal_places: None,
        }
    }
}

impl CompileConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FmResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> FmResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FmResult<()> {
        if self.chunk_size == 0 {
            return Err(FmError::InvalidConfig("chunk_size must be positive".into()));
        }
        if let Some(places) = self.output_decimal_places {
            if places > 12 {
                return Err(FmError::InvalidConfig(format!(
                    "output_decimal_places {} exceeds 12",
                    places
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CompileConfig::from_json_str(r#"{"summary_grouping": "account"}"#).unwrap();
        assert_eq!(config.summary_grouping, SummaryGrouping::Account);
        assert_eq!(config.chunk_size, 100_000);
        assert!(!config.allow_partial_runs);
        assert_eq!(config.output_decimal_places, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(CompileConfig::from_json_str(r#"{"chunk_size": 0}"#).is_err());
        assert!(CompileConfig::from_json_str(r#"{"output_decimal_places": 40}"#).is_err());
        assert!(CompileConfig::from_json_str(r#"{"summary_grouping": "peril"}"#).is_err());
    }
}
