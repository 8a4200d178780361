//! FM levels, term roles and the recognized term fields

use crate::error::{FmError, FmResult};
use crate::exposure::{AccountRecord, ConditionRecord, ExposureRecord, LayerRecord};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The six FM levels, from coverage items up to the policy layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FmLevel {
    SiteCoverage,
    SitePd,
    SiteAll,
    CondAll,
    PolicyAll,
    PolicyLayer,
}

impl FmLevel {
    pub const ALL: [FmLevel; 6] = [
        FmLevel::SiteCoverage,
        FmLevel::SitePd,
        FmLevel::SiteAll,
        FmLevel::CondAll,
        FmLevel::PolicyAll,
        FmLevel::PolicyLayer,
    ];

    /// Canonical level id used in profile files
    pub fn id(&self) -> u8 {
        match self {
            FmLevel::SiteCoverage => 1,
            FmLevel::SitePd => 2,
            FmLevel::SiteAll => 3,
            FmLevel::CondAll => 4,
            FmLevel::PolicyAll => 5,
            FmLevel::PolicyLayer => 6,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|level| level.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FmLevel::SiteCoverage => "site coverage",
            FmLevel::SitePd => "site pd",
            FmLevel::SiteAll => "site all",
            FmLevel::CondAll => "cond all",
            FmLevel::PolicyAll => "policy all",
            FmLevel::PolicyLayer => "policy layer",
        }
    }

    /// Highest term group a level can carry (one per coverage type at site coverage)
    pub fn max_term_group(&self) -> u32 {
        match self {
            FmLevel::SiteCoverage => 4,
            _ => 1,
        }
    }

    /// Record type the level's terms are read from
    pub fn source(&self) -> TermSource {
        match self {
            FmLevel::SiteCoverage | FmLevel::SitePd | FmLevel::SiteAll => TermSource::Location,
            FmLevel::CondAll => TermSource::Condition,
            FmLevel::PolicyAll => TermSource::Account,
            FmLevel::PolicyLayer => TermSource::Layer,
        }
    }

    /// Levels that are always materialized, whatever the profile holds
    pub fn is_mandatory(&self) -> bool {
        matches!(self, FmLevel::SiteCoverage | FmLevel::PolicyLayer)
    }
}

impl fmt::Display for FmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.name())
    }
}

/// Record type a term field lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermSource {
    Location,
    Condition,
    Account,
    Layer,
}

/// Column of the fm_profile table a field fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TermRole {
    /// Slot 1 is the deductible, 2 the minimum and 3 the maximum deductible
    Deductible(u8),
    Limit(u8),
    Share(u8),
    Attachment,
}

impl TermRole {
    pub fn is_valid(&self) -> bool {
        match *self {
            TermRole::Deductible(slot) | TermRole::Share(slot) => (1..=3).contains(&slot),
            TermRole::Limit(slot) => slot == 1,
            TermRole::Attachment => true,
        }
    }
}

impl fmt::Display for TermRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermRole::Deductible(slot) => write!(f, "deductible{}", slot),
            TermRole::Limit(slot) => write!(f, "limit{}", slot),
            TermRole::Share(slot) => write!(f, "share{}", slot),
            TermRole::Attachment => write!(f, "attachment1"),
        }
    }
}

impl FromStr for TermRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "attachment" || lower == "attachment1" {
            return Ok(TermRole::Attachment);
        }

        let split = lower
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("role '{}' has no slot number", s))?;
        let (name, slot) = lower.split_at(split);
        let slot: u8 = slot
            .parse()
            .map_err(|_| format!("role '{}' has an invalid slot", s))?;

        let role = match name {
            "deductible" => TermRole::Deductible(slot),
            "limit" => TermRole::Limit(slot),
            "share" => TermRole::Share(slot),
            _ => return Err(format!("unknown role '{}'", s)),
        };
        if !role.is_valid() {
            return Err(format!("slot {} is out of range for role '{}'", slot, name));
        }
        Ok(role)
    }
}

/// How a raw field value becomes an absolute amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermKind {
    /// Absolute amount
    Flat,
    /// Fraction of the node's aggregate TIV
    ProportionOfTiv,
    /// Fraction of the node's resolved limit
    RatioOfLimit,
}

impl TermKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermKind::Flat => "flat",
            TermKind::ProportionOfTiv => "proportion_of_tiv",
            TermKind::RatioOfLimit => "ratio_of_limit",
        }
    }
}

impl FromStr for TermKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "" => Ok(TermKind::Flat),
            "proportion_of_tiv" | "tiv" => Ok(TermKind::ProportionOfTiv),
            "ratio_of_limit" | "limit" => Ok(TermKind::RatioOfLimit),
            other => Err(format!("unknown term kind '{}'", other)),
        }
    }
}

/// Borrowed view of the record a node's terms are read from
#[derive(Debug, Clone, Copy)]
pub enum TermRecord<'a> {
    Location(&'a ExposureRecord),
    Condition(&'a ConditionRecord),
    Account(&'a AccountRecord),
    Layer(&'a LayerRecord),
}

macro_rules! term_fields {
    ($( $variant:ident => $name:literal, $source:ident, $field:ident; )*) => {
        /// Term columns recognized in the exposure and accounts tables
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum TermField {
            $( $variant, )*
        }

        impl TermField {
            pub const ALL: &'static [TermField] = &[ $( TermField::$variant, )* ];

            /// Column name in the source table
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( TermField::$variant => $name, )*
                }
            }

            pub fn source(&self) -> TermSource {
                match self {
                    $( TermField::$variant => TermSource::$source, )*
                }
            }

            /// Raw cell value, or None when the record is of another type
            pub fn read(&self, record: TermRecord<'_>) -> Option<f64> {
                match (self, record) {
                    $( (TermField::$variant, TermRecord::$source(r)) => r.$field, )*
                    _ => None,
                }
            }
        }
    };
}

term_fields! {
    LocDed1Building => "LocDed1Building", Location, loc_ded1_building;
    LocLimit1Building => "LocLimit1Building", Location, loc_limit1_building;
    LocDed2Other => "LocDed2Other", Location, loc_ded2_other;
    LocLimit2Other => "LocLimit2Other", Location, loc_limit2_other;
    LocDed3Contents => "LocDed3Contents", Location, loc_ded3_contents;
    LocLimit3Contents => "LocLimit3Contents", Location, loc_limit3_contents;
    LocDed4BI => "LocDed4BI", Location, loc_ded4_bi;
    LocLimit4BI => "LocLimit4BI", Location, loc_limit4_bi;
    LocDed5PD => "LocDed5PD", Location, loc_ded5_pd;
    LocLimit5PD => "LocLimit5PD", Location, loc_limit5_pd;
    LocDed6All => "LocDed6All", Location, loc_ded6_all;
    LocLimit6All => "LocLimit6All", Location, loc_limit6_all;
    CondDed6All => "CondDed6All", Condition, cond_ded6_all;
    CondLimit6All => "CondLimit6All", Condition, cond_limit6_all;
    AccDed6All => "AccDed6All", Account, acc_ded6_all;
    AccMinDed6All => "AccMinDed6All", Account, acc_min_ded6_all;
    AccMaxDed6All => "AccMaxDed6All", Account, acc_max_ded6_all;
    AccLimit6All => "AccLimit6All", Account, acc_limit6_all;
    LayerAttachment => "LayerAttachment", Layer, layer_attachment;
    LayerLimit => "LayerLimit", Layer, layer_limit;
    LayerParticipation => "LayerParticipation", Layer, layer_participation;
}

impl FromStr for TermField {
    type Err = FmError;

    fn from_str(s: &str) -> FmResult<Self> {
        let name = s.trim();
        TermField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| FmError::UnknownTermField(name.to_string()))
    }
}

impl fmt::Display for TermField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One profile entry: where a field sits in the FM hierarchy and how it is read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub field: TermField,
    pub level: FmLevel,
    pub term_group: u32,
    pub role: TermRole,
    pub kind: TermKind,
    /// Zero means "not present"
    pub nullable: bool,
    /// Used when the value is absent
    pub default_value: Option<f64>,
}

impl FieldSpec {
    /// Whether a raw cell carries a value for this field
    pub fn supplied(&self, raw: Option<f64>) -> bool {
        match raw {
            None => false,
            Some(v) => !(self.nullable && v == 0.0),
        }
    }

    /// Apply the missing and nullable-zero rules to a raw cell
    pub fn effective(&self, raw: Option<f64>) -> Option<f64> {
        if self.supplied(raw) {
            raw
        } else {
            self.default_value
        }
    }

    /// Same field placement apart from identity
    pub fn same_definition(&self, other: &FieldSpec) -> bool {
        self.field == other.field
            && self.kind == other.kind
            && self.nullable == other.nullable
            && self.default_value.map(f64::to_bits) == other.default_value.map(f64::to_bits)
    }
}
