//! Record types for the canonical exposure, accounts and keys tables

use serde::{Deserialize, Serialize};

/// Coverage type of a location's insured value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoverageType {
    /// Building (structure)
    Buildings,
    /// Other structures
    Other,
    /// Contents
    Contents,
    /// Business interruption / time element
    BusinessInterruption,
}

impl CoverageType {
    /// All coverage types in canonical item order
    pub const ALL: [CoverageType; 4] = [
        CoverageType::Buildings,
        CoverageType::Other,
        CoverageType::Contents,
        CoverageType::BusinessInterruption,
    ];

    /// Numeric id used by the keys table and the coverage-level term groups
    pub fn id(&self) -> u8 {
        match self {
            CoverageType::Buildings => 1,
            CoverageType::Other => 2,
            CoverageType::Contents => 3,
            CoverageType::BusinessInterruption => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(CoverageType::Buildings),
            2 => Some(CoverageType::Other),
            3 => Some(CoverageType::Contents),
            4 => Some(CoverageType::BusinessInterruption),
            _ => None,
        }
    }

    /// Property damage coverages share the combined (PD) term group
    pub fn is_property_damage(&self) -> bool {
        !matches!(self, CoverageType::BusinessInterruption)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::Buildings => "buildings",
            CoverageType::Other => "other",
            CoverageType::Contents => "contents",
            CoverageType::BusinessInterruption => "bi",
        }
    }
}

/// One physical location from the canonical exposure table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureRecord {
    /// Row identifier that key records join on (ROW_ID, else 1-based position)
    pub row_id: u32,

    /// Account the location belongs to
    pub acc_number: String,

    /// Location number within the account
    pub loc_number: String,

    /// Portfolio number, if supplied
    pub port_number: Option<String>,

    // Total insured values by coverage
    pub building_tiv: f64,
    pub other_tiv: f64,
    pub contents_tiv: f64,
    pub bi_tiv: f64,

    // Coverage-level terms
    pub loc_ded1_building: Option<f64>,
    pub loc_limit1_building: Option<f64>,
    pub loc_ded2_other: Option<f64>,
    pub loc_limit2_other: Option<f64>,
    pub loc_ded3_contents: Option<f64>,
    pub loc_limit3_contents: Option<f64>,
    pub loc_ded4_bi: Option<f64>,
    pub loc_limit4_bi: Option<f64>,

    // Combined property damage terms
    pub loc_ded5_pd: Option<f64>,
    pub loc_limit5_pd: Option<f64>,

    // Site terms (all coverages)
    pub loc_ded6_all: Option<f64>,
    pub loc_limit6_all: Option<f64>,

    /// Links the location to an account-level condition (sublimit)
    pub cond_tag: Option<String>,

    /// Overrides the default event-correlation group (the row id)
    pub group_id: Option<u32>,
}

impl ExposureRecord {
    /// Total insured value for a coverage type
    pub fn tiv(&self, coverage: CoverageType) -> f64 {
        match coverage {
            CoverageType::Buildings => self.building_tiv,
            CoverageType::Other => self.other_tiv,
            CoverageType::Contents => self.contents_tiv,
            CoverageType::BusinessInterruption => self.bi_tiv,
        }
    }

    /// Sum of TIVs across all coverage types
    pub fn total_tiv(&self) -> f64 {
        CoverageType::ALL.iter().map(|&c| self.tiv(c)).sum()
    }

    /// Correlation group for items at this location
    pub fn correlation_group(&self) -> u32 {
        self.group_id.unwrap_or(self.row_id)
    }
}

/// One layer (policy row) of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
    pub pol_number: String,
    pub layer_number: Option<u32>,
    pub layer_attachment: Option<f64>,
    pub layer_limit: Option<f64>,
    pub layer_participation: Option<f64>,
}

/// A conditional sublimit shared by the locations tagged with its number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub cond_number: String,
    pub cond_ded6_all: Option<f64>,
    pub cond_limit6_all: Option<f64>,
}

/// One account assembled from all its rows in the accounts table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub acc_number: String,
    pub port_number: Option<String>,

    // Account-level terms (taken from the account's first row)
    pub acc_ded6_all: Option<f64>,
    pub acc_min_ded6_all: Option<f64>,
    pub acc_max_ded6_all: Option<f64>,
    pub acc_limit6_all: Option<f64>,

    /// Layers in accounts-table order; never empty
    pub layers: Vec<LayerRecord>,

    /// Distinct conditions in first-seen order
    pub conditions: Vec<ConditionRecord>,
}

impl AccountRecord {
    /// Find the condition a location's CondTag refers to
    pub fn condition(&self, cond_tag: Option<&str>) -> Option<&ConditionRecord> {
        let tag = cond_tag?;
        self.conditions.iter().find(|c| c.cond_number == tag)
    }
}

/// Status of a hazard-lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Success,
    Fail,
    NoMatch,
}

impl KeyStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Some(KeyStatus::Success),
            "fail" => Some(KeyStatus::Fail),
            "nomatch" => Some(KeyStatus::NoMatch),
            _ => None,
        }
    }
}

/// Hazard-lookup result for one (location, coverage type, peril)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub loc_id: u32,
    pub peril_id: String,
    pub coverage_type: CoverageType,
    pub area_peril_id: u64,
    pub vulnerability_id: u32,
    pub status: KeyStatus,
    pub message: String,
}

impl KeyRecord {
    pub fn is_success(&self) -> bool {
        self.status == KeyStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_type_ids() {
        for coverage in CoverageType::ALL {
            assert_eq!(CoverageType::from_id(coverage.id()), Some(coverage));
        }
        assert_eq!(CoverageType::from_id(0), None);
        assert_eq!(CoverageType::from_id(5), None);
        assert!(CoverageType::Contents.is_property_damage());
        assert!(!CoverageType::BusinessInterruption.is_property_damage());
    }

    #[test]
    fn test_key_status_parse() {
        assert_eq!(KeyStatus::parse("success"), Some(KeyStatus::Success));
        assert_eq!(KeyStatus::parse("NoMatch"), Some(KeyStatus::NoMatch));
        assert_eq!(KeyStatus::parse("FAIL"), Some(KeyStatus::Fail));
        assert_eq!(KeyStatus::parse("ok"), None);
    }

    #[test]
    fn test_account_condition_lookup() {
        let account = AccountRecord {
            acc_number: "A1".into(),
            port_number: None,
            acc_ded6_all: None,
            acc_min_ded6_all: None,
            acc_max_ded6_all: None,
            acc_limit6_all: None,
            layers: vec![],
            conditions: vec![ConditionRecord {
                cond_number: "7".into(),
                cond_ded6_all: Some(100.0),
                cond_limit6_all: None,
            }],
        };
        assert!(account.condition(Some("7")).is_some());
        assert!(account.condition(Some("8")).is_none());
        assert!(account.condition(None).is_none());
    }
}
