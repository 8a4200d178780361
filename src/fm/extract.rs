//! Policy term extraction for aggregation nodes

use super::calcrule::TermPresence;
use super::hierarchy::{AggLevel, AggNode};
use crate::error::{FmError, FmResult};
use crate::exposure::SourceData;
use crate::gul::GulInputs;
use crate::profile::{FmLevel, TermGroup, TermKind, TermRecord, TermRole, UnifiedProfile};
use rayon::prelude::*;

/// Resolved (absolute) terms of one node and layer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeTerms {
    /// Deductible, minimum deductible, maximum deductible
    pub deductible: [Option<f64>; 3],
    pub limit: Option<f64>,
    pub share: [Option<f64>; 3],
    pub attachment: Option<f64>,
}

impl NodeTerms {
    pub fn presence(&self) -> TermPresence {
        TermPresence {
            deductible: self.deductible[0].is_some(),
            deductible_clamped: self.deductible[1].is_some() || self.deductible[2].is_some(),
            limit: self.limit.is_some(),
            share: self.share.iter().any(Option::is_some),
            attachment: self.attachment.is_some(),
        }
    }

    /// Layer profiles repeat the attachment in deductible1 when no deductible
    /// is set. Calc rule selection reads the presence vector before this.
    pub fn with_attachment_deductible(mut self) -> Self {
        if self.deductible[0].is_none() {
            self.deductible[0] = self.attachment;
        }
        self
    }

    fn set(&mut self, role: TermRole, value: f64) {
        match role {
            TermRole::Deductible(slot) => self.deductible[slot as usize - 1] = Some(value),
            TermRole::Limit(_) => self.limit = Some(value),
            TermRole::Share(slot) => self.share[slot as usize - 1] = Some(value),
            TermRole::Attachment => self.attachment = Some(value),
        }
    }
}

/// Terms of every node at a level, indexed `[agg_id - 1][layer_id - 1]`
///
/// Only the policy layer level has more than one layer per node.
pub fn extract_level(
    level: &AggLevel,
    profile: &UnifiedProfile,
    source: &SourceData,
    gul: &GulInputs,
) -> FmResult<Vec<Vec<NodeTerms>>> {
    if level.pass_through {
        return Ok(vec![vec![NodeTerms::default()]; level.nodes.len()]);
    }

    let results: Vec<FmResult<Vec<NodeTerms>>> = level
        .nodes
        .par_iter()
        .map(|node| extract_node(level, node, profile, source, gul))
        .collect();

    // Sequential collect keeps the reported error deterministic
    results.into_iter().collect()
}

fn extract_node(
    level: &AggLevel,
    node: &AggNode,
    profile: &UnifiedProfile,
    source: &SourceData,
    gul: &GulInputs,
) -> FmResult<Vec<NodeTerms>> {
    let item = &gul.items[node.item];
    let location = &source.exposures[item.location];
    let account = &source.accounts[item.account];

    let (term_group, record) = match level.level {
        FmLevel::SiteCoverage => (
            Some(item.coverage_type.id() as u32),
            Some(TermRecord::Location(location)),
        ),
        FmLevel::SitePd if item.coverage_type.is_property_damage() => {
            (Some(1), Some(TermRecord::Location(location)))
        }
        FmLevel::SitePd => (None, None),
        FmLevel::SiteAll => (Some(1), Some(TermRecord::Location(location))),
        FmLevel::CondAll => (
            Some(1),
            account
                .condition(location.cond_tag.as_deref())
                .map(TermRecord::Condition),
        ),
        FmLevel::PolicyAll => (Some(1), Some(TermRecord::Account(account))),
        FmLevel::PolicyLayer => {
            let group = profile.group(FmLevel::PolicyLayer, 1);
            return account
                .layers
                .iter()
                .map(|layer| match group {
                    Some(group) => {
                        resolve_group(group, TermRecord::Layer(layer), level, node)
                    }
                    None => Ok(NodeTerms::default()),
                })
                .collect();
        }
    };

    let terms = match (term_group, record) {
        (Some(term_group), Some(record)) => match profile.group(level.level, term_group) {
            Some(group) => resolve_group(group, record, level, node)?,
            None => NodeTerms::default(),
        },
        _ => NodeTerms::default(),
    };
    Ok(vec![terms])
}

/// Read and resolve every field of a term group from one record
fn resolve_group(
    group: &TermGroup,
    record: TermRecord<'_>,
    level: &AggLevel,
    node: &AggNode,
) -> FmResult<NodeTerms> {
    let mut terms = NodeTerms::default();
    let mut ratios = Vec::new();

    for (role, spec) in group {
        let value = match spec.effective(spec.field.read(record)) {
            Some(value) => value,
            None => continue,
        };

        let resolved = match spec.kind {
            TermKind::Flat => match role {
                // Sheets carry percentage deductibles as fractions of TIV
                TermRole::Deductible(_) if value > 0.0 && value < 1.0 => value * node.tiv,
                _ => value,
            },
            TermKind::ProportionOfTiv => value * node.tiv,
            TermKind::RatioOfLimit => {
                ratios.push((*role, spec, value));
                continue;
            }
        };
        terms.set(*role, resolved);
    }

    for (role, spec, value) in ratios {
        let limit = terms.limit.ok_or_else(|| FmError::RatioWithoutLimit {
            field: spec.field.to_string(),
            level_id: level.level_id,
            agg_id: node.agg_id,
        })?;
        terms.set(role, value * limit);
    }

    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileConfig;
    use crate::fm::hierarchy::{plan_levels, Hierarchy};
    use crate::gul::build_gul_inputs;
    use crate::profile::{FieldSpec, TermField};
    use approx::assert_relative_eq;

    const EXPOSURE: &str = "\
AccNumber,LocNumber,BuildingTIV,OtherTIV,ContentsTIV,BITIV,LocDed1Building,LocLimit1Building,LocDed4BI,LocLimit4BI,LocDed5PD
1,L1,1000000,0,50000,20000,0.05,900000,0,18000,1000
";

    const ACCOUNTS: &str = "\
AccNumber,PolNumber,LayerAttachment,LayerLimit,LayerParticipation
1,1,0,,0.1
1,2,1500000,3500000,0.5
";

    const KEYS: &str = "\
LocID,PerilID,CoverageTypeID,AreaPerilID,VulnerabilityID
1,WTC,1,1,1
1,WTC,3,1,1
1,WTC,4,1,1
";

    fn setup(profile: &UnifiedProfile) -> (SourceData, GulInputs, Hierarchy) {
        let source =
            SourceData::from_readers(EXPOSURE.as_bytes(), ACCOUNTS.as_bytes(), KEYS.as_bytes())
                .unwrap();
        let config = CompileConfig::default();
        let gul = build_gul_inputs(&source, &config).unwrap();
        let plan = plan_levels(profile, &source, &config);
        let hierarchy = Hierarchy::build(&plan, &gul, &source);
        (source, gul, hierarchy)
    }

    #[test]
    fn test_coverage_terms() {
        let profile = UnifiedProfile::default_oed().unwrap();
        let (source, gul, hierarchy) = setup(&profile);
        let level = hierarchy.level(1).unwrap();
        let terms = extract_level(level, &profile, &source, &gul).unwrap();

        // Percentage deductible resolved against the buildings TIV
        assert_relative_eq!(terms[0][0].deductible[0].unwrap(), 50_000.0);
        assert_eq!(terms[0][0].limit, Some(900_000.0));
        // Contents has no terms
        assert_eq!(terms[1][0], NodeTerms::default());
        // Zero BI deductible is nullable, so only the limit is present
        assert_eq!(terms[2][0].deductible[0], None);
        assert_eq!(terms[2][0].limit, Some(18_000.0));
    }

    #[test]
    fn test_pd_bucket_terms() {
        let profile = UnifiedProfile::default_oed().unwrap();
        let (source, gul, hierarchy) = setup(&profile);
        let level = hierarchy.level(2).unwrap();
        assert_eq!(level.level, FmLevel::SitePd);
        let terms = extract_level(level, &profile, &source, &gul).unwrap();
        assert_eq!(terms[0][0].deductible[0], Some(1_000.0));
        assert_eq!(terms[1][0], NodeTerms::default());
    }

    #[test]
    fn test_layer_terms_fork_per_layer() {
        let profile = UnifiedProfile::default_oed().unwrap();
        let (source, gul, hierarchy) = setup(&profile);
        let top = hierarchy.top().unwrap();
        let terms = extract_level(top, &profile, &source, &gul).unwrap();

        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].len(), 2);

        let first = terms[0][0];
        assert_eq!(first.limit, Some(crate::profile::UNLIMITED));
        assert_eq!(first.share[0], Some(0.1));
        assert_eq!(first.attachment, None);

        let second = terms[0][1];
        assert_eq!(second.attachment, Some(1_500_000.0));
        assert_eq!(second.limit, Some(3_500_000.0));
        assert_eq!(second.share[0], Some(0.5));
    }

    #[test]
    fn test_ratio_and_proportion_kinds() {
        let mut exposure = crate::profile::default_exposure_profile();
        exposure.retain(|s| s.level != FmLevel::SitePd);
        exposure.push(FieldSpec {
            field: TermField::LocDed5PD,
            level: FmLevel::SitePd,
            term_group: 1,
            role: TermRole::Deductible(1),
            kind: TermKind::ProportionOfTiv,
            nullable: true,
            default_value: None,
        });
        let accounts = crate::profile::default_accounts_profile();
        let profile =
            UnifiedProfile::build([exposure.as_slice(), accounts.as_slice()]).unwrap();
        let (source, gul, hierarchy) = setup(&profile);

        let level = hierarchy.level(2).unwrap();
        let terms = extract_level(level, &profile, &source, &gul).unwrap();
        // 1000 x (1,000,000 + 50,000)
        assert_relative_eq!(terms[0][0].deductible[0].unwrap(), 1_050_000_000.0);

        let ratio = vec![FieldSpec {
            field: TermField::LocDed5PD,
            level: FmLevel::SitePd,
            term_group: 1,
            role: TermRole::Deductible(1),
            kind: TermKind::RatioOfLimit,
            nullable: true,
            default_value: None,
        }];
        let profile = UnifiedProfile::build([ratio.as_slice()]).unwrap();
        let err = extract_level(level, &profile, &source, &gul).unwrap_err();
        assert!(matches!(
            err,
            FmError::RatioWithoutLimit { level_id: 2, agg_id: 1, .. }
        ));
    }

    #[test]
    fn test_presence_vector() {
        let terms = NodeTerms {
            deductible: [Some(10.0), None, Some(100.0)],
            limit: Some(50.0),
            ..NodeTerms::default()
        };
        let presence = terms.presence();
        assert!(presence.deductible);
        assert!(presence.deductible_clamped);
        assert!(presence.limit);
        assert!(!presence.share);
        assert!(!presence.attachment);
    }

    #[test]
    fn test_attachment_fills_empty_layer_deductible() {
        let layer = NodeTerms {
            attachment: Some(1_500_000.0),
            limit: Some(3_500_000.0),
            share: [Some(0.5), None, None],
            ..NodeTerms::default()
        };
        let presence = layer.presence();
        let emitted = layer.with_attachment_deductible();
        assert_eq!(emitted.deductible[0], Some(1_500_000.0));
        assert!(!presence.deductible);

        let with_ded = NodeTerms {
            deductible: [Some(10.0), None, None],
            ..layer
        };
        assert_eq!(with_ded.with_attachment_deductible().deductible[0], Some(10.0));
        assert_eq!(NodeTerms::default().with_attachment_deductible(), NodeTerms::default());
    }
}
