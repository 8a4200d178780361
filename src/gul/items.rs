//! Ground-up loss items built from exposure rows joined with hazard keys

use crate::config::CompileConfig;
use crate::error::{FmError, FmResult};
use crate::exposure::{CoverageType, SourceData};
use rayon::prelude::*;
use std::collections::HashMap;

/// One ground-up loss item (one successful key)
#[derive(Debug, Clone, PartialEq)]
pub struct GulItem {
    pub item_id: u32,
    pub coverage_id: u32,
    pub areaperil_id: u64,
    pub vulnerability_id: u32,
    pub group_id: u32,
    pub tiv: f64,

    /// Index into `SourceData::exposures`
    pub location: usize,
    /// Index into `SourceData::accounts`
    pub account: usize,
    pub coverage_type: CoverageType,
    pub peril_id: String,
}

/// Insured value of one (location, coverage type) with at least one item
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub coverage_id: u32,
    pub tiv: f64,
    pub location: usize,
    pub account: usize,
    pub coverage_type: CoverageType,
}

/// Items and coverages of one compilation run
#[derive(Debug, Clone, Default)]
pub struct GulInputs {
    /// Ordered by item_id (1..N)
    pub items: Vec<GulItem>,
    /// Ordered by coverage_id (1..N)
    pub coverages: Vec<Coverage>,
}

impl GulInputs {
    pub fn coverage(&self, coverage_id: u32) -> Option<&Coverage> {
        let idx = coverage_id.checked_sub(1)? as usize;
        self.coverages.get(idx)
    }
}

/// Per-location draft built in parallel, before ids are known
struct LocationDraft {
    location: usize,
    account: Option<usize>,
    coverages: Vec<CoverageDraft>,
}

struct CoverageDraft {
    coverage_type: CoverageType,
    tiv: f64,
    /// Indices into `SourceData::keys`, in key-file order
    keys: Vec<usize>,
}

/// Successful keys grouped by (row id, coverage type), in key-file order
fn index_keys(source: &SourceData, config: &CompileConfig) -> FmResult<HashMap<(u32, CoverageType), Vec<usize>>> {
    let row_ids: HashMap<u32, usize> = source
        .exposures
        .iter()
        .enumerate()
        .map(|(idx, e)| (e.row_id, idx))
        .collect();

    let mut index: HashMap<(u32, CoverageType), Vec<usize>> = HashMap::new();
    let mut unsuccessful = 0usize;

    for (idx, key) in source.keys.iter().enumerate() {
        if !key.is_success() {
            unsuccessful += 1;
            continue;
        }
        if !row_ids.contains_key(&key.loc_id) {
            if config.allow_partial_runs {
                log::warn!(
                    "Dropping key row {}: unknown location {}",
                    idx + 1,
                    key.loc_id
                );
                continue;
            }
            return Err(FmError::UnknownLocation {
                row: idx + 1,
                loc_id: key.loc_id,
            });
        }
        index
            .entry((key.loc_id, key.coverage_type))
            .or_default()
            .push(idx);
    }

    if unsuccessful > 0 {
        log::info!("Ignoring {} unsuccessful key records", unsuccessful);
    }
    Ok(index)
}

/// Build GUL items and coverages
///
/// Locations are drafted in parallel chunk by chunk; item and coverage ids
/// are then assigned in one sequential pass so the output does not depend on
/// the thread count.
pub fn build_gul_inputs(source: &SourceData, config: &CompileConfig) -> FmResult<GulInputs> {
    let key_index = index_keys(source, config)?;
    let accounts: HashMap<&str, usize> = source
        .accounts
        .iter()
        .enumerate()
        .map(|(idx, a)| (a.acc_number.as_str(), idx))
        .collect();

    let chunk_size = config.chunk_size.max(1);
    let mut gul = GulInputs::default();

    for (chunk_idx, chunk) in source.exposures.chunks(chunk_size).enumerate() {
        let offset = chunk_idx * chunk_size;

        let drafts: Vec<LocationDraft> = chunk
            .par_iter()
            .enumerate()
            .map(|(i, exposure)| {
                let coverages = CoverageType::ALL
                    .iter()
                    .filter_map(|&coverage_type| {
                        let tiv = exposure.tiv(coverage_type);
                        if tiv == 0.0 {
                            return None;
                        }
                        let keys = key_index
                            .get(&(exposure.row_id, coverage_type))
                            .cloned()
                            .unwrap_or_default();
                        Some(CoverageDraft {
                            coverage_type,
                            tiv,
                            keys,
                        })
                    })
                    .collect();

                LocationDraft {
                    location: offset + i,
                    account: accounts.get(exposure.acc_number.as_str()).copied(),
                    coverages,
                }
            })
            .collect();

        log::debug!(
            "Drafted chunk {} ({} locations)",
            chunk_idx + 1,
            drafts.len()
        );

        for draft in drafts {
            assign_ids(&mut gul, draft, source, config)?;
        }
    }

    log::info!(
        "Built {} GUL items over {} coverages from {} locations",
        gul.items.len(),
        gul.coverages.len(),
        source.exposures.len()
    );
    Ok(gul)
}

fn assign_ids(
    gul: &mut GulInputs,
    draft: LocationDraft,
    source: &SourceData,
    config: &CompileConfig,
) -> FmResult<()> {
    let exposure = &source.exposures[draft.location];

    // Zero-TIV or keyless locations contribute nothing, whatever their account
    if draft.coverages.iter().all(|c| c.keys.is_empty()) {
        log::debug!("Location {} has no insured coverage with keys", exposure.row_id);
        return Ok(());
    }

    let account = match draft.account {
        Some(account) => account,
        None if config.allow_partial_runs => {
            log::warn!(
                "Skipping location {} (row {}): unknown account {}",
                exposure.loc_number,
                exposure.row_id,
                exposure.acc_number
            );
            return Ok(());
        }
        None => {
            return Err(FmError::UnknownAccount {
                row_id: exposure.row_id,
                loc_number: exposure.loc_number.clone(),
                acc_number: exposure.acc_number.clone(),
            })
        }
    };

    for coverage in draft.coverages {
        if coverage.keys.is_empty() {
            log::debug!(
                "Location {} has no successful keys for {}",
                exposure.row_id,
                coverage.coverage_type.as_str()
            );
            continue;
        }

        let coverage_id = gul.coverages.len() as u32 + 1;
        gul.coverages.push(Coverage {
            coverage_id,
            tiv: coverage.tiv,
            location: draft.location,
            account,
            coverage_type: coverage.coverage_type,
        });

        for key_idx in coverage.keys {
            let key = &source.keys[key_idx];
            gul.items.push(GulItem {
                item_id: gul.items.len() as u32 + 1,
                coverage_id,
                areaperil_id: key.area_peril_id,
                vulnerability_id: key.vulnerability_id,
                group_id: exposure.correlation_group(),
                tiv: coverage.tiv,
                location: draft.location,
                account,
                coverage_type: coverage.coverage_type,
                peril_id: key.peril_id.clone(),
            });
        }
    }

    Ok(())
}
