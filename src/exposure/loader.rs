//! Load the canonical exposure, accounts and keys tables

use super::{
    AccountRecord, ConditionRecord, CoverageType, ExposureRecord, KeyRecord, KeyStatus,
    LayerRecord,
};
use crate::error::{FmError, FmResult};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Raw CSV row matching the canonical exposure columns
#[derive(Debug, serde::Deserialize)]
struct ExposureCsvRow {
    #[serde(rename = "ROW_ID", default)]
    row_id: Option<u32>,
    #[serde(rename = "AccNumber")]
    acc_number: String,
    #[serde(rename = "LocNumber")]
    loc_number: String,
    #[serde(rename = "PortNumber", default)]
    port_number: Option<String>,
    #[serde(rename = "BuildingTIV")]
    building_tiv: f64,
    #[serde(rename = "OtherTIV")]
    other_tiv: f64,
    #[serde(rename = "ContentsTIV")]
    contents_tiv: f64,
    #[serde(rename = "BITIV")]
    bi_tiv: f64,
    #[serde(rename = "LocDed1Building", default)]
    loc_ded1_building: Option<f64>,
    #[serde(rename = "LocLimit1Building", default)]
    loc_limit1_building: Option<f64>,
    #[serde(rename = "LocDed2Other", default)]
    loc_ded2_other: Option<f64>,
    #[serde(rename = "LocLimit2Other", default)]
    loc_limit2_other: Option<f64>,
    #[serde(rename = "LocDed3Contents", default)]
    loc_ded3_contents: Option<f64>,
    #[serde(rename = "LocLimit3Contents", default)]
    loc_limit3_contents: Option<f64>,
    #[serde(rename = "LocDed4BI", default)]
    loc_ded4_bi: Option<f64>,
    #[serde(rename = "LocLimit4BI", default)]
    loc_limit4_bi: Option<f64>,
    #[serde(rename = "LocDed5PD", default)]
    loc_ded5_pd: Option<f64>,
    #[serde(rename = "LocLimit5PD", default)]
    loc_limit5_pd: Option<f64>,
    #[serde(rename = "LocDed6All", default)]
    loc_ded6_all: Option<f64>,
    #[serde(rename = "LocLimit6All", default)]
    loc_limit6_all: Option<f64>,
    #[serde(rename = "CondTag", default)]
    cond_tag: Option<String>,
    #[serde(rename = "GroupID", default)]
    group_id: Option<u32>,
}

impl ExposureCsvRow {
    fn to_record(self, position: usize) -> FmResult<ExposureRecord> {
        let invalid = |reason: String| FmError::InvalidRecord {
            table: "exposure",
            row: position,
            reason,
        };

        for (name, value) in [
            ("BuildingTIV", self.building_tiv),
            ("OtherTIV", self.other_tiv),
            ("ContentsTIV", self.contents_tiv),
            ("BITIV", self.bi_tiv),
        ] {
            check_amount(name, Some(value)).map_err(invalid)?;
        }
        for (name, value) in [
            ("LocDed1Building", self.loc_ded1_building),
            ("LocLimit1Building", self.loc_limit1_building),
            ("LocDed2Other", self.loc_ded2_other),
            ("LocLimit2Other", self.loc_limit2_other),
            ("LocDed3Contents", self.loc_ded3_contents),
            ("LocLimit3Contents", self.loc_limit3_contents),
            ("LocDed4BI", self.loc_ded4_bi),
            ("LocLimit4BI", self.loc_limit4_bi),
            ("LocDed5PD", self.loc_ded5_pd),
            ("LocLimit5PD", self.loc_limit5_pd),
            ("LocDed6All", self.loc_ded6_all),
            ("LocLimit6All", self.loc_limit6_all),
        ] {
            check_amount(name, value).map_err(invalid)?;
        }

        Ok(ExposureRecord {
            row_id: self.row_id.unwrap_or(position as u32),
            acc_number: self.acc_number,
            loc_number: self.loc_number,
            port_number: non_empty(self.port_number),
            building_tiv: self.building_tiv,
            other_tiv: self.other_tiv,
            contents_tiv: self.contents_tiv,
            bi_tiv: self.bi_tiv,
            loc_ded1_building: self.loc_ded1_building,
            loc_limit1_building: self.loc_limit1_building,
            loc_ded2_other: self.loc_ded2_other,
            loc_limit2_other: self.loc_limit2_other,
            loc_ded3_contents: self.loc_ded3_contents,
            loc_limit3_contents: self.loc_limit3_contents,
            loc_ded4_bi: self.loc_ded4_bi,
            loc_limit4_bi: self.loc_limit4_bi,
            loc_ded5_pd: self.loc_ded5_pd,
            loc_limit5_pd: self.loc_limit5_pd,
            loc_ded6_all: self.loc_ded6_all,
            loc_limit6_all: self.loc_limit6_all,
            cond_tag: non_empty(self.cond_tag),
            group_id: self.group_id,
        })
    }
}

/// Raw CSV row of the accounts table (one row per layer)
#[derive(Debug, serde::Deserialize)]
struct AccountCsvRow {
    #[serde(rename = "AccNumber")]
    acc_number: String,
    #[serde(rename = "PolNumber")]
    pol_number: String,
    #[serde(rename = "PortNumber", default)]
    port_number: Option<String>,
    #[serde(rename = "LayerNumber", default)]
    layer_number: Option<u32>,
    #[serde(rename = "AccDed6All", default)]
    acc_ded6_all: Option<f64>,
    #[serde(rename = "AccMinDed6All", default)]
    acc_min_ded6_all: Option<f64>,
    #[serde(rename = "AccMaxDed6All", default)]
    acc_max_ded6_all: Option<f64>,
    #[serde(rename = "AccLimit6All", default)]
    acc_limit6_all: Option<f64>,
    #[serde(rename = "CondNumber", default)]
    cond_number: Option<String>,
    #[serde(rename = "CondDed6All", default)]
    cond_ded6_all: Option<f64>,
    #[serde(rename = "CondLimit6All", default)]
    cond_limit6_all: Option<f64>,
    #[serde(rename = "LayerAttachment", default)]
    layer_attachment: Option<f64>,
    #[serde(rename = "LayerLimit", default)]
    layer_limit: Option<f64>,
    #[serde(rename = "LayerParticipation", default)]
    layer_participation: Option<f64>,
}

impl AccountCsvRow {
    fn validate(&self, position: usize) -> FmResult<()> {
        for (name, value) in [
            ("AccDed6All", self.acc_ded6_all),
            ("AccMinDed6All", self.acc_min_ded6_all),
            ("AccMaxDed6All", self.acc_max_ded6_all),
            ("AccLimit6All", self.acc_limit6_all),
            ("CondDed6All", self.cond_ded6_all),
            ("CondLimit6All", self.cond_limit6_all),
            ("LayerAttachment", self.layer_attachment),
            ("LayerLimit", self.layer_limit),
            ("LayerParticipation", self.layer_participation),
        ] {
            check_amount(name, value).map_err(|reason| FmError::InvalidRecord {
                table: "accounts",
                row: position,
                reason,
            })?;
        }
        if let Some(share) = self.layer_participation {
            if share > 1.0 {
                return Err(FmError::InvalidRecord {
                    table: "accounts",
                    row: position,
                    reason: format!("LayerParticipation {} exceeds 1", share),
                });
            }
        }
        Ok(())
    }

    fn layer(&self) -> LayerRecord {
        LayerRecord {
            pol_number: self.pol_number.clone(),
            layer_number: self.layer_number,
            layer_attachment: self.layer_attachment,
            layer_limit: self.layer_limit,
            layer_participation: self.layer_participation,
        }
    }
}

/// Raw CSV row of the keys table
#[derive(Debug, serde::Deserialize)]
struct KeyCsvRow {
    #[serde(rename = "LocID")]
    loc_id: u32,
    #[serde(rename = "PerilID")]
    peril_id: String,
    #[serde(rename = "CoverageTypeID")]
    coverage_type_id: u8,
    #[serde(rename = "AreaPerilID")]
    area_peril_id: u64,
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: u32,
    // Plain keys files only carry successful lookups
    #[serde(rename = "Status", default = "default_status")]
    status: String,
    #[serde(rename = "Message", default)]
    message: String,
}

fn default_status() -> String {
    "success".to_string()
}

impl KeyCsvRow {
    fn to_key(self, position: usize) -> FmResult<KeyRecord> {
        let coverage_type =
            CoverageType::from_id(self.coverage_type_id).ok_or_else(|| FmError::InvalidRecord {
                table: "keys",
                row: position,
                reason: format!("Unknown CoverageTypeID: {}", self.coverage_type_id),
            })?;
        let status = KeyStatus::parse(&self.status).ok_or_else(|| FmError::InvalidRecord {
            table: "keys",
            row: position,
            reason: format!("Unknown Status: {}", self.status),
        })?;

        Ok(KeyRecord {
            loc_id: self.loc_id,
            peril_id: self.peril_id,
            coverage_type,
            area_peril_id: self.area_peril_id,
            vulnerability_id: self.vulnerability_id,
            status,
            message: self.message,
        })
    }
}

fn check_amount(name: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() => Err(format!("{} is not a finite number", name)),
        Some(v) if v < 0.0 => Err(format!("{} is negative: {}", name, v)),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Deserialize every row of a table, tagging failures with the 1-based row
fn read_rows<R: Read, T: DeserializeOwned>(reader: R, table: &'static str) -> FmResult<Vec<T>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let row: T = result.map_err(|source| FmError::Table {
            table,
            row: idx + 1,
            source,
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Load exposure records from any reader
pub fn load_exposures_from_reader<R: Read>(reader: R) -> FmResult<Vec<ExposureRecord>> {
    let rows: Vec<ExposureCsvRow> = read_rows(reader, "exposure")?;
    let mut seen = HashSet::with_capacity(rows.len());
    let mut records = Vec::with_capacity(rows.len());

    for (idx, row) in rows.into_iter().enumerate() {
        let record = row.to_record(idx + 1)?;
        if !seen.insert(record.row_id) {
            return Err(FmError::InvalidRecord {
                table: "exposure",
                row: idx + 1,
                reason: format!("Duplicate ROW_ID {}", record.row_id),
            });
        }
        records.push(record);
    }

    Ok(records)
}

/// Load exposure records from a CSV file
pub fn load_exposures<P: AsRef<Path>>(path: P) -> FmResult<Vec<ExposureRecord>> {
    load_exposures_from_reader(File::open(path)?)
}

/// Load accounts from any reader, grouping layer rows by AccNumber
pub fn load_accounts_from_reader<R: Read>(reader: R) -> FmResult<Vec<AccountRecord>> {
    let rows: Vec<AccountCsvRow> = read_rows(reader, "accounts")?;
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut accounts: Vec<AccountRecord> = Vec::new();

    for (idx, row) in rows.into_iter().enumerate() {
        row.validate(idx + 1)?;

        let slot = match index.get(&row.acc_number) {
            Some(&slot) => slot,
            None => {
                index.insert(row.acc_number.clone(), accounts.len());
                accounts.push(AccountRecord {
                    acc_number: row.acc_number.clone(),
                    port_number: non_empty(row.port_number.clone()),
                    acc_ded6_all: row.acc_ded6_all,
                    acc_min_ded6_all: row.acc_min_ded6_all,
                    acc_max_ded6_all: row.acc_max_ded6_all,
                    acc_limit6_all: row.acc_limit6_all,
                    layers: Vec::new(),
                    conditions: Vec::new(),
                });
                accounts.len() - 1
            }
        };

        let account = &mut accounts[slot];
        if account.acc_ded6_all != row.acc_ded6_all || account.acc_limit6_all != row.acc_limit6_all {
            log::warn!(
                "Account {} row {} repeats account terms with different values; using the first row",
                row.acc_number,
                idx + 1
            );
        }

        if let Some(cond_number) = non_empty(row.cond_number.clone()) {
            if !account.conditions.iter().any(|c| c.cond_number == cond_number) {
                account.conditions.push(ConditionRecord {
                    cond_number,
                    cond_ded6_all: row.cond_ded6_all,
                    cond_limit6_all: row.cond_limit6_all,
                });
            }
        }

        account.layers.push(row.layer());
    }

    Ok(accounts)
}

/// Load accounts from a CSV file
pub fn load_accounts<P: AsRef<Path>>(path: P) -> FmResult<Vec<AccountRecord>> {
    load_accounts_from_reader(File::open(path)?)
}

/// Load key records from any reader
pub fn load_keys_from_reader<R: Read>(reader: R) -> FmResult<Vec<KeyRecord>> {
    let rows: Vec<KeyCsvRow> = read_rows(reader, "keys")?;
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| row.to_key(idx + 1))
        .collect()
}

/// Load key records from a CSV file
pub fn load_keys<P: AsRef<Path>>(path: P) -> FmResult<Vec<KeyRecord>> {
    load_keys_from_reader(File::open(path)?)
}
