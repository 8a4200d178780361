//! Row types of the eight emitted tables and their assembly

use crate::config::{CompileConfig, SummaryGrouping};
use crate::exposure::SourceData;
use crate::fm::{dedup::round_to, FmProgramme};
use crate::gul::GulInputs;
use serde::Serialize;
use std::collections::HashMap;

/// A row of an emitted table
pub trait TableRow: Serialize {
    /// File stem of the table
    const NAME: &'static str;
    /// Column names, in serialization order
    const HEADER: &'static [&'static str];
}

macro_rules! table_row {
    ($row:ident, $name:literal, [$($field:ident: $ty:ty),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
        pub struct $row {
            $( pub $field: $ty, )+
        }

        impl TableRow for $row {
            const NAME: &'static str = $name;
            const HEADER: &'static [&'static str] = &[$( stringify!($field), )+];
        }
    };
}

table_row!(ItemRow, "items", [
    item_id: u32,
    coverage_id: u32,
    areaperil_id: u64,
    vulnerability_id: u32,
    group_id: u32,
]);

table_row!(CoverageRow, "coverages", [coverage_id: u32, tiv: f64]);

table_row!(GulSummaryXrefRow, "gulsummaryxref", [
    coverage_id: u32,
    summary_id: u32,
    summaryset_id: u32,
]);

table_row!(FmProgrammeRow, "fm_programme", [
    level_id: u32,
    from_agg_id: u32,
    to_agg_id: u32,
]);

table_row!(FmProfileRow, "fm_profile", [
    policytc_id: u32,
    calcrule_id: u32,
    deductible1: f64,
    deductible2: f64,
    deductible3: f64,
    attachment1: f64,
    limit1: f64,
    share1: f64,
    share2: f64,
    share3: f64,
]);

table_row!(FmPolicyTcRow, "fm_policytc", [
    level_id: u32,
    layer_id: u32,
    agg_id: u32,
    policytc_id: u32,
]);

table_row!(FmXrefRow, "fm_xref", [output: u32, agg_id: u32, layer_id: u32]);

table_row!(FmSummaryXrefRow, "fmsummaryxref", [
    output: u32,
    summary_id: u32,
    summaryset_id: u32,
]);

/// Summary set every xref row belongs to
pub const SUMMARYSET_ID: u32 = 1;

/// The complete, mutually consistent table set of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledTables {
    pub items: Vec<ItemRow>,
    pub coverages: Vec<CoverageRow>,
    pub gulsummaryxref: Vec<GulSummaryXrefRow>,
    pub fm_programme: Vec<FmProgrammeRow>,
    pub fm_profile: Vec<FmProfileRow>,
    pub fm_policytc: Vec<FmPolicyTcRow>,
    pub fm_xref: Vec<FmXrefRow>,
    pub fmsummaryxref: Vec<FmSummaryXrefRow>,
}

impl CompiledTables {
    /// Flatten GUL inputs and the FM programme into table rows
    pub fn assemble(
        gul: &GulInputs,
        programme: &FmProgramme,
        source: &SourceData,
        config: &CompileConfig,
    ) -> Self {
        let summaries = SummaryIds::new(gul, source, config.summary_grouping);
        let round = |value: f64| match config.output_decimal_places {
            Some(places) => round_to(value, places),
            None => value,
        };

        let items = gul
            .items
            .iter()
            .map(|item| ItemRow {
                item_id: item.item_id,
                coverage_id: item.coverage_id,
                areaperil_id: item.areaperil_id,
                vulnerability_id: item.vulnerability_id,
                group_id: item.group_id,
            })
            .collect();

        let coverages = gul
            .coverages
            .iter()
            .map(|coverage| CoverageRow {
                coverage_id: coverage.coverage_id,
                tiv: round(coverage.tiv),
            })
            .collect();

        let gulsummaryxref = gul
            .coverages
            .iter()
            .map(|coverage| GulSummaryXrefRow {
                coverage_id: coverage.coverage_id,
                summary_id: summaries.get(coverage.location, coverage.account),
                summaryset_id: SUMMARYSET_ID,
            })
            .collect();

        let fm_programme = programme
            .hierarchy
            .levels
            .iter()
            .flat_map(|level| {
                level.edges().map(move |(from_agg_id, to_agg_id)| FmProgrammeRow {
                    level_id: level.level_id,
                    from_agg_id,
                    to_agg_id,
                })
            })
            .collect();

        let fm_profile = programme
            .profiles
            .iter()
            .map(|p| FmProfileRow {
                policytc_id: p.policytc_id,
                calcrule_id: p.calcrule_id,
                // Amounts were rounded before deduplication
                deductible1: p.deductible1,
                deductible2: p.deductible2,
                deductible3: p.deductible3,
                attachment1: p.attachment1,
                limit1: p.limit1,
                share1: p.share1,
                share2: p.share2,
                share3: p.share3,
            })
            .collect();

        let fm_policytc = programme
            .policytc
            .iter()
            .map(|a| FmPolicyTcRow {
                level_id: a.level_id,
                layer_id: a.layer_id,
                agg_id: a.agg_id,
                policytc_id: a.policytc_id,
            })
            .collect();

        // One output per (level-1 node, layer of its account)
        let mut fm_xref = Vec::new();
        let mut fmsummaryxref = Vec::new();
        if let Some(first) = programme.hierarchy.levels.first() {
            for node in &first.nodes {
                let item = &gul.items[node.item];
                let layers = source.accounts[item.account].layers.len();
                for idx in 0..layers {
                    let output = fm_xref.len() as u32 + 1;
                    fm_xref.push(FmXrefRow {
                        output,
                        agg_id: node.agg_id,
                        layer_id: idx as u32 + 1,
                    });
                    fmsummaryxref.push(FmSummaryXrefRow {
                        output,
                        summary_id: summaries.get(item.location, item.account),
                        summaryset_id: SUMMARYSET_ID,
                    });
                }
            }
        }

        Self {
            items,
            coverages,
            gulsummaryxref,
            fm_programme,
            fm_profile,
            fm_policytc,
            fm_xref,
            fmsummaryxref,
        }
    }

    /// Number of levels in fm_programme
    pub fn level_count(&self) -> u32 {
        self.fm_programme.iter().map(|r| r.level_id).max().unwrap_or(0)
    }
}

/// Summary id lookup for the configured grouping
struct SummaryIds {
    grouping: SummaryGrouping,
    row_ids: Vec<u32>,
    accounts: HashMap<usize, u32>,
}

impl SummaryIds {
    fn new(gul: &GulInputs, source: &SourceData, grouping: SummaryGrouping) -> Self {
        // Account summaries are numbered in first-seen coverage order
        let mut accounts = HashMap::new();
        for coverage in &gul.coverages {
            let next = accounts.len() as u32 + 1;
            accounts.entry(coverage.account).or_insert(next);
        }
        Self {
            grouping,
            row_ids: source.exposures.iter().map(|e| e.row_id).collect(),
            accounts,
        }
    }

    fn get(&self, location: usize, account: usize) -> u32 {
        match self.grouping {
            SummaryGrouping::Portfolio => 1,
            SummaryGrouping::Account => self.accounts.get(&account).copied().unwrap_or(1),
            SummaryGrouping::Location => self.row_ids[location],
        }
    }
}
