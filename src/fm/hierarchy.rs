//! Aggregation hierarchy from GUL items up to one node per account

use crate::config::CompileConfig;
use crate::exposure::SourceData;
use crate::gul::GulInputs;
use crate::profile::{FmLevel, TermRecord, TermSource, UnifiedProfile};
use std::collections::HashMap;

/// An FM level chosen for materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedLevel {
    pub level: FmLevel,
    /// Inactive level kept as a 1:1 pass-through with no terms
    pub pass_through: bool,
}

/// Decide which FM levels are materialized, in level order
pub fn plan_levels(
    profile: &UnifiedProfile,
    source: &SourceData,
    config: &CompileConfig,
) -> Vec<PlannedLevel> {
    let mut planned = Vec::new();

    for level in FmLevel::ALL {
        if level.is_mandatory() || is_active(level, profile, source) {
            planned.push(PlannedLevel {
                level,
                pass_through: false,
            });
        } else if config.materialize_empty_levels {
            log::debug!("Level {} has no terms; materializing as pass-through", level);
            planned.push(PlannedLevel {
                level,
                pass_through: true,
            });
        } else {
            log::debug!("Level {} has no terms; skipped", level);
        }
    }

    planned
}

/// A level is active when the profile defines fields for it and some record supplies one
fn is_active(level: FmLevel, profile: &UnifiedProfile, source: &SourceData) -> bool {
    let supplied_by = |record: TermRecord<'_>| {
        profile
            .level_specs(level)
            .any(|spec| spec.effective(spec.field.read(record)).is_some())
    };

    if !profile.defines(level) {
        return false;
    }

    match level.source() {
        TermSource::Location => source
            .exposures
            .iter()
            .any(|e| supplied_by(TermRecord::Location(e))),
        TermSource::Condition => source
            .accounts
            .iter()
            .flat_map(|a| a.conditions.iter())
            .any(|c| supplied_by(TermRecord::Condition(c))),
        TermSource::Account => source
            .accounts
            .iter()
            .any(|a| supplied_by(TermRecord::Account(a))),
        TermSource::Layer => source
            .accounts
            .iter()
            .flat_map(|a| a.layers.iter())
            .any(|l| supplied_by(TermRecord::Layer(l))),
    }
}

/// Grouping key of a node at a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Item(usize),
    SitePd { location: usize, pd: bool },
    Site(usize),
    Condition { account: usize, tag: Option<&'a str> },
    Account(usize),
    PassThrough(u32),
}

/// One aggregation node
#[derive(Debug, Clone, PartialEq)]
pub struct AggNode {
    pub agg_id: u32,
    /// Sum of the TIVs of the distinct coverages under the node
    pub tiv: f64,
    /// Index of the first GUL item under the node
    pub item: usize,
}

/// One materialized level
#[derive(Debug, Clone)]
pub struct AggLevel {
    /// Consecutive level number starting at 1
    pub level_id: u32,
    pub level: FmLevel,
    pub pass_through: bool,
    /// Ordered by agg_id (1..N)
    pub nodes: Vec<AggNode>,
    /// `parents[i]` is the agg id that child `i + 1` rolls up to; children are
    /// the previous level's nodes, or the items at level 1
    pub parents: Vec<u32>,
}

impl AggLevel {
    /// fm_programme rows `(from_agg_id, to_agg_id)` of this level
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.parents
            .iter()
            .enumerate()
            .map(|(idx, &to)| (idx as u32 + 1, to))
    }
}

/// The levelled aggregation graph
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub levels: Vec<AggLevel>,
}

impl Hierarchy {
    /// Build every planned level bottom-up
    pub fn build(plan: &[PlannedLevel], gul: &GulInputs, source: &SourceData) -> Self {
        let mut levels: Vec<AggLevel> = Vec::with_capacity(plan.len());

        for (idx, planned) in plan.iter().enumerate() {
            let level_id = idx as u32 + 1;
            let built = match levels.last() {
                None => item_level(level_id, planned, gul),
                Some(prev) => group_level(level_id, planned, prev, gul, source),
            };
            log::debug!(
                "Level {} ({}): {} nodes",
                level_id,
                planned.level.name(),
                built.nodes.len()
            );
            levels.push(built);
        }

        let mut hierarchy = Self { levels };
        hierarchy.assign_tivs(gul);
        hierarchy
    }

    pub fn level(&self, level_id: u32) -> Option<&AggLevel> {
        let idx = level_id.checked_sub(1)? as usize;
        self.levels.get(idx)
    }

    pub fn top(&self) -> Option<&AggLevel> {
        self.levels.last()
    }

    /// Node TIV is the sum over distinct coverages, so multi-peril items
    /// under one node count their coverage once
    fn assign_tivs(&mut self, gul: &GulInputs) {
        let mut item_node: Vec<u32> = gul.items.iter().map(|i| i.item_id).collect();

        for (idx, level) in self.levels.iter_mut().enumerate() {
            if idx > 0 {
                for node in item_node.iter_mut() {
                    *node = level.parents[*node as usize - 1];
                }
            }

            for node in level.nodes.iter_mut() {
                node.tiv = 0.0;
            }

            let mut start = 0;
            while start < gul.items.len() {
                let coverage_id = gul.items[start].coverage_id;
                let mut end = start + 1;
                while end < gul.items.len() && gul.items[end].coverage_id == coverage_id {
                    end += 1;
                }

                let mut seen: Vec<u32> = item_node[start..end].to_vec();
                seen.sort_unstable();
                seen.dedup();
                for agg_id in seen {
                    level.nodes[agg_id as usize - 1].tiv += gul.items[start].tiv;
                }

                start = end;
            }
        }
    }
}

fn item_level(level_id: u32, planned: &PlannedLevel, gul: &GulInputs) -> AggLevel {
    AggLevel {
        level_id,
        level: planned.level,
        pass_through: planned.pass_through,
        nodes: gul
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| AggNode {
                agg_id: item.item_id,
                tiv: 0.0,
                item: idx,
            })
            .collect(),
        parents: gul.items.iter().map(|item| item.item_id).collect(),
    }
}

fn group_level(
    level_id: u32,
    planned: &PlannedLevel,
    prev: &AggLevel,
    gul: &GulInputs,
    source: &SourceData,
) -> AggLevel {
    let mut ids: HashMap<GroupKey<'_>, u32> = HashMap::new();
    let mut nodes: Vec<AggNode> = Vec::new();
    let mut parents: Vec<u32> = Vec::with_capacity(prev.nodes.len());

    for child in &prev.nodes {
        let key = if planned.pass_through {
            GroupKey::PassThrough(child.agg_id)
        } else {
            group_key(planned.level, child.item, gul, source)
        };

        let agg_id = *ids.entry(key).or_insert_with(|| {
            let agg_id = nodes.len() as u32 + 1;
            nodes.push(AggNode {
                agg_id,
                tiv: 0.0,
                item: child.item,
            });
            agg_id
        });
        parents.push(agg_id);
    }

    AggLevel {
        level_id,
        level: planned.level,
        pass_through: planned.pass_through,
        nodes,
        parents,
    }
}

fn group_key<'a>(level: FmLevel, item: usize, gul: &GulInputs, source: &'a SourceData) -> GroupKey<'a> {
    let item = &gul.items[item];
    match level {
        FmLevel::SiteCoverage => GroupKey::Item(item.item_id as usize),
        FmLevel::SitePd => GroupKey::SitePd {
            location: item.location,
            pd: item.coverage_type.is_property_damage(),
        },
        FmLevel::SiteAll => GroupKey::Site(item.location),
        FmLevel::CondAll => GroupKey::Condition {
            account: item.account,
            tag: source.exposures[item.location].cond_tag.as_deref(),
        },
        FmLevel::PolicyAll | FmLevel::PolicyLayer => GroupKey::Account(item.account),
    }
}
