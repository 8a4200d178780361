//! Determinism and structural properties of compiled table sets
//!
//! The same source bundle must always produce byte-identical tables, no
//! matter how the work is chunked, and every table set must satisfy the
//! connectivity and conservation properties downstream loss engines rely on.

use fm_compiler::fm::{plan_levels, Hierarchy};
use fm_compiler::gul::build_gul_inputs;
use fm_compiler::{CompileConfig, FmCompiler, SourceData, SummaryGrouping, UnifiedProfile};
use std::collections::{HashMap, HashSet};

const EXPOSURE: &str = "\
AccNumber,LocNumber,BuildingTIV,OtherTIV,ContentsTIV,BITIV,LocDed1Building,LocLimit1Building,LocDed4BI,LocDed6All,LocLimit6All
A1,L1,1000000,100000,50000,20000,10000,,,,
A1,L2,1700000,30000,1000000,50000,10000,,2000,,
A2,L3,500000,0,250000,0,0.02,,,1000,600000
A2,L4,750000,0,0,10000,,,,1000,600000
A3,L5,2000000,0,0,0,0.1,,,,
";

const ACCOUNTS: &str = "\
AccNumber,PolNumber,AccDed6All,LayerAttachment,LayerLimit,LayerParticipation
A1,P1,50000,,2500000,1
A2,P1,,,1000000,0.5
A2,P2,,1000000,2000000,0.25
A3,P1,25000,,1500000,0.1
";

/// One peril per coverage, so node TIVs conserve coverage TIV exactly
const KEYS: &str = "\
LocID,PerilID,CoverageTypeID,AreaPerilID,VulnerabilityID
1,WTC,1,11,1
1,WTC,2,11,2
1,WTC,3,11,3
1,WTC,4,11,4
2,WTC,1,12,1
2,WTC,2,12,2
2,WTC,3,12,3
2,WTC,4,12,4
3,WTC,1,13,1
3,WTC,3,13,3
4,WTC,1,14,1
4,WTC,4,14,4
5,WTC,1,15,1
";

fn source() -> SourceData {
    SourceData::from_readers(EXPOSURE.as_bytes(), ACCOUNTS.as_bytes(), KEYS.as_bytes())
        .expect("fixture loads")
}

fn compile_with(config: CompileConfig) -> fm_compiler::CompiledTables {
    FmCompiler::new()
        .expect("default compiler")
        .with_config(config)
        .compile(&source())
        .expect("fixture compiles")
}

#[test]
fn same_input_produces_identical_bytes() {
    let first = compile_with(CompileConfig::default()).to_buffers().expect("buffers");
    let second = compile_with(CompileConfig::default()).to_buffers().expect("buffers");

    assert_eq!(first.len(), 8, "all eight tables must be rendered");
    for (name, bytes) in &first {
        assert_eq!(
            Some(bytes),
            second.get(name),
            "table {} differs between two identical runs",
            name
        );
    }
}

#[test]
fn chunk_size_does_not_change_output() {
    let baseline = compile_with(CompileConfig::default());
    for chunk_size in [1, 2, 3] {
        let chunked = compile_with(CompileConfig {
            chunk_size,
            ..CompileConfig::default()
        });
        assert_eq!(
            baseline, chunked,
            "chunk_size {} produced a different table set",
            chunk_size
        );
    }
}

#[test]
fn programme_is_connected() {
    let tables = compile_with(CompileConfig::default());
    let levels = tables.level_count();
    assert!(levels >= 2);

    let mut previous_nodes: Vec<u32> = tables.items.iter().map(|i| i.item_id).collect();
    for level_id in 1..=levels {
        let rows: Vec<_> = tables
            .fm_programme
            .iter()
            .filter(|r| r.level_id == level_id)
            .collect();
        let froms: Vec<u32> = rows.iter().map(|r| r.from_agg_id).collect();
        assert_eq!(
            froms, previous_nodes,
            "level {} must map every node of the level below exactly once",
            level_id
        );

        let targets: HashSet<u32> = rows.iter().map(|r| r.to_agg_id).collect();
        let mut nodes: Vec<u32> = targets.into_iter().collect();
        nodes.sort_unstable();
        let expected: Vec<u32> = (1..=nodes.len() as u32).collect();
        assert_eq!(nodes, expected, "level {} agg ids must be contiguous", level_id);
        previous_nodes = nodes;
    }

    // One top node per account
    assert_eq!(previous_nodes.len(), 3);
}

#[test]
fn every_node_and_layer_has_a_policytc() {
    let tables = compile_with(CompileConfig::default());
    let profile_ids: HashSet<u32> = tables.fm_profile.iter().map(|p| p.policytc_id).collect();

    let mut nodes_per_level: HashMap<u32, HashSet<u32>> = HashMap::new();
    for row in &tables.fm_programme {
        nodes_per_level
            .entry(row.level_id)
            .or_default()
            .insert(row.to_agg_id);
    }
    for row in &tables.fm_policytc {
        assert!(
            profile_ids.contains(&row.policytc_id),
            "policytc {} has no fm_profile row",
            row.policytc_id
        );
        assert!(nodes_per_level[&row.level_id].contains(&row.agg_id));
    }

    // Account A2 carries two layers at the top level
    let top = tables.level_count();
    let top_rows: Vec<(u32, u32)> = tables
        .fm_policytc
        .iter()
        .filter(|r| r.level_id == top)
        .map(|r| (r.agg_id, r.layer_id))
        .collect();
    assert_eq!(top_rows, vec![(1, 1), (2, 1), (2, 2), (3, 1)]);
}

fn assert_unique_profiles(tables: &fm_compiler::CompiledTables) {
    for (i, a) in tables.fm_profile.iter().enumerate() {
        for b in &tables.fm_profile[i + 1..] {
            let same = a.calcrule_id == b.calcrule_id
                && a.deductible1 == b.deductible1
                && a.deductible2 == b.deductible2
                && a.deductible3 == b.deductible3
                && a.attachment1 == b.attachment1
                && a.limit1 == b.limit1
                && a.share1 == b.share1
                && a.share2 == b.share2
                && a.share3 == b.share3;
            assert!(!same, "policytc {} duplicates {}", a.policytc_id, b.policytc_id);
        }
    }
}

#[test]
fn profiles_are_unique() {
    let tables = compile_with(CompileConfig::default());
    let ids: Vec<u32> = tables.fm_profile.iter().map(|p| p.policytc_id).collect();
    let expected: Vec<u32> = (1..=ids.len() as u32).collect();
    assert_eq!(ids, expected, "policytc ids must be dense from 1");
    assert_unique_profiles(&tables);
}

#[test]
fn node_tiv_is_conserved_at_every_level() {
    let source = source();
    let config = CompileConfig::default();
    let profile = UnifiedProfile::default_oed().expect("default profile");
    let gul = build_gul_inputs(&source, &config).expect("gul inputs");
    let plan = plan_levels(&profile, &source, &config);
    let hierarchy = Hierarchy::build(&plan, &gul, &source);

    let total: f64 = gul.coverages.iter().map(|c| c.tiv).sum();
    for level in &hierarchy.levels {
        let level_total: f64 = level.nodes.iter().map(|n| n.tiv).sum();
        approx::assert_relative_eq!(level_total, total, max_relative = 1e-12);
    }
}

#[test]
fn xref_covers_every_layer_of_every_leaf() {
    let tables = compile_with(CompileConfig::default());
    // A2 has two layers: L3 buildings+contents and L4 buildings+BI
    assert_eq!(tables.items.len(), 13);
    assert_eq!(tables.fm_xref.len(), 13 + 4);
    assert_eq!(tables.fmsummaryxref.len(), tables.fm_xref.len());

    let outputs: Vec<u32> = tables.fm_xref.iter().map(|r| r.output).collect();
    let expected: Vec<u32> = (1..=outputs.len() as u32).collect();
    assert_eq!(outputs, expected);
}

#[test]
fn account_grouping_numbers_summaries_per_account() {
    let tables = compile_with(CompileConfig {
        summary_grouping: SummaryGrouping::Account,
        ..CompileConfig::default()
    });
    let summaries: Vec<u32> = tables.gulsummaryxref.iter().map(|r| r.summary_id).collect();
    assert_eq!(summaries, vec![1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 3]);
}

#[test]
fn location_grouping_numbers_summaries_per_location() {
    let tables = compile_with(CompileConfig {
        summary_grouping: SummaryGrouping::Location,
        ..CompileConfig::default()
    });
    let summaries: Vec<u32> = tables.gulsummaryxref.iter().map(|r| r.summary_id).collect();
    assert_eq!(summaries, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 4, 4, 5]);

    let fm_summaries: HashSet<u32> = tables.fmsummaryxref.iter().map(|r| r.summary_id).collect();
    assert_eq!(fm_summaries.len(), 5);
}

#[test]
fn rounding_applies_to_amounts_only() {
    let tables = compile_with(CompileConfig {
        output_decimal_places: Some(0),
        ..CompileConfig::default()
    });
    for profile in &tables.fm_profile {
        assert_eq!(profile.deductible1, profile.deductible1.round());
        assert_eq!(profile.limit1, profile.limit1.round());
    }
    assert!(tables.fm_profile.iter().any(|p| p.share1 == 0.25));
    assert_unique_profiles(&tables);
}

#[test]
fn deductibles_equal_after_rounding_share_a_profile() {
    let exposure = "\
AccNumber,LocNumber,BuildingTIV,OtherTIV,ContentsTIV,BITIV,LocDed1Building
A1,L1,1000000,0,0,0,100.3
A1,L2,1000000,0,0,0,100.4
";
    let accounts = "AccNumber,PolNumber\nA1,P1\n";
    let keys = "LocID,PerilID,CoverageTypeID,AreaPerilID,VulnerabilityID\n1,WTC,1,1,1\n2,WTC,1,2,1\n";
    let source = SourceData::from_readers(exposure.as_bytes(), accounts.as_bytes(), keys.as_bytes())
        .expect("fixture loads");

    let exact = FmCompiler::new().expect("default compiler").compile(&source).expect("compiles");
    let leaf_ids = |tables: &fm_compiler::CompiledTables| -> Vec<u32> {
        tables
            .fm_policytc
            .iter()
            .filter(|r| r.level_id == 1)
            .map(|r| r.policytc_id)
            .collect()
    };
    assert_eq!(leaf_ids(&exact), vec![1, 2]);

    let rounded = FmCompiler::new()
        .expect("default compiler")
        .with_config(CompileConfig {
            output_decimal_places: Some(0),
            ..CompileConfig::default()
        })
        .compile(&source)
        .expect("compiles");
    assert_eq!(
        leaf_ids(&rounded),
        vec![1, 1],
        "terms equal at the emitted precision must share one policytc"
    );
    assert_eq!(rounded.fm_profile[0].deductible1, 100.0);
    assert_unique_profiles(&rounded);
}
