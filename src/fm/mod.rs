//! Financial module programme: hierarchy, terms, calc rules and policytc profiles

pub mod calcrule;
pub mod dedup;
pub mod extract;
pub mod hierarchy;
pub mod validate;

pub use calcrule::{CalcRuleCatalogue, TermPresence};
pub use dedup::{PolicyTerm, ProfileDeduplicator};
pub use extract::NodeTerms;
pub use hierarchy::{plan_levels, AggLevel, AggNode, Hierarchy, PlannedLevel};

use crate::config::CompileConfig;
use crate::error::FmResult;
use crate::exposure::SourceData;
use crate::gul::GulInputs;
use crate::profile::{FmLevel, UnifiedProfile};

/// Binding of one node and layer to its profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyTcAssignment {
    pub level_id: u32,
    pub layer_id: u32,
    pub agg_id: u32,
    pub policytc_id: u32,
}

/// Compiled FM programme
#[derive(Debug, Clone, Default)]
pub struct FmProgramme {
    pub hierarchy: Hierarchy,
    /// Ordered by (level, agg, layer)
    pub policytc: Vec<PolicyTcAssignment>,
    /// Ordered by policytc id
    pub profiles: Vec<PolicyTerm>,
}

impl FmProgramme {
    /// Build the hierarchy, then classify and deduplicate every node's terms
    pub fn build(
        gul: &GulInputs,
        source: &SourceData,
        profile: &UnifiedProfile,
        catalogue: &CalcRuleCatalogue,
        config: &CompileConfig,
    ) -> FmResult<Self> {
        let plan = plan_levels(profile, source, config);
        let hierarchy = Hierarchy::build(&plan, gul, source);

        let mut dedup = ProfileDeduplicator::with_rounding(config.output_decimal_places);
        let mut policytc = Vec::new();

        for level in &hierarchy.levels {
            let terms = extract::extract_level(level, profile, source, gul)?;

            for (node, layers) in level.nodes.iter().zip(&terms) {
                for (idx, node_terms) in layers.iter().enumerate() {
                    let layer_id = idx as u32 + 1;
                    let calcrule_id = catalogue.classify(
                        &node_terms.presence(),
                        level.level_id,
                        node.agg_id,
                        layer_id,
                    )?;
                    let emitted = match level.level {
                        FmLevel::PolicyLayer => node_terms.with_attachment_deductible(),
                        _ => *node_terms,
                    };
                    policytc.push(PolicyTcAssignment {
                        level_id: level.level_id,
                        layer_id,
                        agg_id: node.agg_id,
                        policytc_id: dedup.assign(calcrule_id, &emitted),
                    });
                }
            }
        }

        log::info!(
            "FM programme: {} levels, {} policytc assignments, {} distinct profiles",
            hierarchy.levels.len(),
            policytc.len(),
            dedup.len()
        );

        Ok(Self {
            hierarchy,
            policytc,
            profiles: dedup.into_profiles(),
        })
    }
}
