//! Exposure, accounts and hazard-key source tables

mod data;
pub mod loader;

pub use data::{
    AccountRecord, ConditionRecord, CoverageType, ExposureRecord, KeyRecord, KeyStatus,
    LayerRecord,
};
pub use loader::{load_accounts, load_exposures, load_keys};

use crate::error::FmResult;
use std::io::Read;
use std::path::Path;

/// The three source tables of one compilation run
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub exposures: Vec<ExposureRecord>,
    pub accounts: Vec<AccountRecord>,
    pub keys: Vec<KeyRecord>,
}

impl SourceData {
    /// Load all three tables from CSV files
    pub fn load(exposure: &Path, accounts: &Path, keys: &Path) -> FmResult<Self> {
        let source = Self {
            exposures: loader::load_exposures(exposure)?,
            accounts: loader::load_accounts(accounts)?,
            keys: loader::load_keys(keys)?,
        };
        log::info!(
            "Loaded {} locations, {} accounts, {} keys",
            source.exposures.len(),
            source.accounts.len(),
            source.keys.len()
        );
        Ok(source)
    }

    /// Load all three tables from in-memory readers
    pub fn from_readers<E: Read, A: Read, K: Read>(
        exposure: E,
        accounts: A,
        keys: K,
    ) -> FmResult<Self> {
        Ok(Self {
            exposures: loader::load_exposures_from_reader(exposure)?,
            accounts: loader::load_accounts_from_reader(accounts)?,
            keys: loader::load_keys_from_reader(keys)?,
        })
    }
}
