//! CSV loader for term profiles
//!
//! A profile file lists one term field per row:
//! `field,level_id,term_group,role,kind,nullable,default_value`

use super::terms::{FieldSpec, FmLevel, TermField, TermKind, TermRole};
use crate::error::{FmError, FmResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default path to the profiles directory
pub const DEFAULT_PROFILES_PATH: &str = "data/profiles";

pub const EXPOSURE_PROFILE_FILE: &str = "exposure_profile.csv";
pub const ACCOUNTS_PROFILE_FILE: &str = "accounts_profile.csv";

/// Value used for an unlimited layer limit
pub const UNLIMITED: f64 = 9_999_999_999.0;

#[derive(Debug, serde::Deserialize)]
struct ProfileCsvRow {
    field: String,
    level_id: u8,
    term_group: u32,
    role: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    nullable: String,
    #[serde(default)]
    default_value: Option<f64>,
}

impl ProfileCsvRow {
    fn to_spec(&self) -> FmResult<FieldSpec> {
        let field: TermField = self.field.parse()?;
        let invalid = |reason: String| FmError::InvalidProfileEntry {
            field: self.field.clone(),
            reason,
        };

        let level = FmLevel::from_id(self.level_id)
            .ok_or_else(|| invalid(format!("unknown level id {}", self.level_id)))?;
        let role: TermRole = self.role.parse().map_err(invalid)?;
        let kind: TermKind = self.kind.parse().map_err(invalid)?;
        let nullable = parse_flag(&self.nullable).map_err(invalid)?;

        Ok(FieldSpec {
            field,
            level,
            term_group: self.term_group,
            role,
            kind,
            nullable,
            default_value: self.default_value,
        })
    }
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" | "" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

/// Load profile entries from any reader
pub fn load_profile_from_reader<R: Read>(reader: R) -> FmResult<Vec<FieldSpec>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut specs = Vec::new();
    for (idx, result) in csv_reader.deserialize().enumerate() {
        let row: ProfileCsvRow = result.map_err(|source| FmError::Table {
            table: "profile",
            row: idx + 1,
            source,
        })?;
        specs.push(row.to_spec()?);
    }

    Ok(specs)
}

/// Load profile entries from a CSV file
pub fn load_profile<P: AsRef<Path>>(path: P) -> FmResult<Vec<FieldSpec>> {
    load_profile_from_reader(File::open(path)?)
}

fn flat(
    field: TermField,
    level: FmLevel,
    term_group: u32,
    role: TermRole,
) -> FieldSpec {
    FieldSpec {
        field,
        level,
        term_group,
        role,
        kind: TermKind::Flat,
        nullable: true,
        default_value: None,
    }
}

/// Built-in exposure-side profile, equal to data/profiles/exposure_profile.csv
pub fn default_exposure_profile() -> Vec<FieldSpec> {
    use FmLevel::*;
    use TermField::*;

    vec![
        flat(LocDed1Building, SiteCoverage, 1, TermRole::Deductible(1)),
        flat(LocLimit1Building, SiteCoverage, 1, TermRole::Limit(1)),
        flat(LocDed2Other, SiteCoverage, 2, TermRole::Deductible(1)),
        flat(LocLimit2Other, SiteCoverage, 2, TermRole::Limit(1)),
        flat(LocDed3Contents, SiteCoverage, 3, TermRole::Deductible(1)),
        flat(LocLimit3Contents, SiteCoverage, 3, TermRole::Limit(1)),
        flat(LocDed4BI, SiteCoverage, 4, TermRole::Deductible(1)),
        flat(LocLimit4BI, SiteCoverage, 4, TermRole::Limit(1)),
        flat(LocDed5PD, SitePd, 1, TermRole::Deductible(1)),
        flat(LocLimit5PD, SitePd, 1, TermRole::Limit(1)),
        flat(LocDed6All, SiteAll, 1, TermRole::Deductible(1)),
        flat(LocLimit6All, SiteAll, 1, TermRole::Limit(1)),
    ]
}

/// Built-in accounts-side profile, equal to data/profiles/accounts_profile.csv
pub fn default_accounts_profile() -> Vec<FieldSpec> {
    use FmLevel::*;
    use TermField::*;

    vec![
        flat(CondDed6All, CondAll, 1, TermRole::Deductible(1)),
        flat(CondLimit6All, CondAll, 1, TermRole::Limit(1)),
        flat(AccDed6All, PolicyAll, 1, TermRole::Deductible(1)),
        flat(AccMinDed6All, PolicyAll, 1, TermRole::Deductible(2)),
        flat(AccMaxDed6All, PolicyAll, 1, TermRole::Deductible(3)),
        flat(AccLimit6All, PolicyAll, 1, TermRole::Limit(1)),
        flat(LayerAttachment, PolicyLayer, 1, TermRole::Attachment),
        FieldSpec {
            default_value: Some(UNLIMITED),
            ..flat(LayerLimit, PolicyLayer, 1, TermRole::Limit(1))
        },
        FieldSpec {
            nullable: false,
            default_value: Some(1.0),
            ..flat(LayerParticipation, PolicyLayer, 1, TermRole::Share(1))
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS_PROFILE: &str = "\
field,level_id,term_group,role,kind,nullable,default_value
# account terms
AccDed6All,5,1,deductible1,flat,true,
LayerLimit,6,1,limit1,flat,true,9999999999
LayerParticipation,6,1,share1,flat,false,1
";

    #[test]
    fn test_load_profile() {
        let specs = load_profile_from_reader(ACCOUNTS_PROFILE.as_bytes()).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].field, TermField::AccDed6All);
        assert_eq!(specs[0].level, FmLevel::PolicyAll);
        assert_eq!(specs[0].default_value, None);
        assert_eq!(specs[1].default_value, Some(UNLIMITED));
        assert!(!specs[2].nullable);
        assert_eq!(specs[2].role, TermRole::Share(1));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let csv = "field,level_id,term_group,role,kind,nullable,default_value\n\
                   LocDed7,1,1,deductible1,flat,true,\n";
        let err = load_profile_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, FmError::UnknownTermField(ref f) if f == "LocDed7"));
    }

    #[test]
    fn test_bad_role_and_level_rejected() {
        let csv = "field,level_id,term_group,role,kind,nullable,default_value\n\
                   LocDed6All,3,1,limit2,flat,true,\n";
        assert!(matches!(
            load_profile_from_reader(csv.as_bytes()),
            Err(FmError::InvalidProfileEntry { .. })
        ));

        let csv = "field,level_id,term_group,role,kind,nullable,default_value\n\
                   LocDed6All,9,1,deductible1,flat,true,\n";
        assert!(matches!(
            load_profile_from_reader(csv.as_bytes()),
            Err(FmError::InvalidProfileEntry { .. })
        ));
    }

    #[test]
    fn test_defaults_cover_every_field() {
        let mut fields: Vec<TermField> = default_exposure_profile()
            .into_iter()
            .chain(default_accounts_profile())
            .map(|spec| spec.field)
            .collect();
        fields.sort();
        assert_eq!(fields, TermField::ALL.to_vec());
    }
}
