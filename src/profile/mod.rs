//! Term profiles: which source columns feed which fm_profile terms at each level

mod terms;
mod unified;
pub mod loader;

pub use loader::{default_accounts_profile, default_exposure_profile, UNLIMITED};
pub use terms::{FieldSpec, FmLevel, TermField, TermKind, TermRecord, TermRole, TermSource};
pub use unified::{TermGroup, UnifiedProfile};

use crate::error::FmResult;
use std::path::Path;

impl UnifiedProfile {
    /// Unified profile built from the built-in exposure and accounts profiles
    pub fn default_oed() -> FmResult<Self> {
        let exposure = default_exposure_profile();
        let accounts = default_accounts_profile();
        Self::build([exposure.as_slice(), accounts.as_slice()])
    }

    /// Load `exposure_profile.csv` and `accounts_profile.csv` from a directory
    pub fn from_dir(path: &Path) -> FmResult<Self> {
        let exposure = loader::load_profile(path.join(loader::EXPOSURE_PROFILE_FILE))?;
        let accounts = loader::load_profile(path.join(loader::ACCOUNTS_PROFILE_FILE))?;
        let unified = Self::build([exposure.as_slice(), accounts.as_slice()])?;
        log::debug!(
            "Loaded {} profile fields from {}",
            unified.len(),
            path.display()
        );
        Ok(unified)
    }
}
