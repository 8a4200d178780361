//! Referential integrity checks over a compiled table set

use crate::error::{FmError, FmResult};
use crate::output::CompiledTables;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

fn fail<T>(message: String) -> FmResult<T> {
    Err(FmError::Consistency(message))
}

fn check_contiguous(name: &str, ids: impl Iterator<Item = u32>) -> FmResult<()> {
    for (idx, id) in ids.enumerate() {
        if id != idx as u32 + 1 {
            return fail(format!("{} ids are not contiguous: expected {}, found {}", name, idx + 1, id));
        }
    }
    Ok(())
}

/// Check every cross-table reference before anything is written
pub fn validate_tables(tables: &CompiledTables) -> FmResult<()> {
    check_contiguous("item", tables.items.iter().map(|r| r.item_id))?;
    check_contiguous("coverage", tables.coverages.iter().map(|r| r.coverage_id))?;

    let coverage_count = tables.coverages.len() as u32;
    if let Some(item) = tables
        .items
        .iter()
        .find(|r| r.coverage_id == 0 || r.coverage_id > coverage_count)
    {
        return fail(format!(
            "item {} references missing coverage {}",
            item.item_id, item.coverage_id
        ));
    }
    let referenced: HashSet<u32> = tables.items.iter().map(|r| r.coverage_id).collect();
    if referenced.len() as u32 != coverage_count {
        return fail("coverage without items".to_string());
    }

    check_contiguous(
        "gulsummaryxref coverage",
        tables.gulsummaryxref.iter().map(|r| r.coverage_id),
    )?;
    if tables.gulsummaryxref.len() != tables.coverages.len() {
        return fail("gulsummaryxref does not cover every coverage".to_string());
    }

    let node_counts = check_programme(tables)?;
    check_policytc(tables, &node_counts)?;
    check_xref(tables, &node_counts)?;
    Ok(())
}

/// Each level's children are the previous level's nodes, each rolled up exactly once
fn check_programme(tables: &CompiledTables) -> FmResult<BTreeMap<u32, u32>> {
    let mut levels: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for row in &tables.fm_programme {
        levels
            .entry(row.level_id)
            .or_default()
            .push((row.from_agg_id, row.to_agg_id));
    }

    let mut node_counts = BTreeMap::new();
    let mut children = tables.items.len() as u32;

    for (idx, (&level_id, edges)) in levels.iter().enumerate() {
        if level_id != idx as u32 + 1 {
            return fail(format!("fm_programme level {} is out of sequence", level_id));
        }
        check_contiguous(
            &format!("level {} from_agg", level_id),
            edges.iter().map(|&(from, _)| from),
        )?;
        if edges.len() as u32 != children {
            return fail(format!(
                "level {} rolls up {} children, expected {}",
                level_id,
                edges.len(),
                children
            ));
        }

        let targets: BTreeSet<u32> = edges.iter().map(|&(_, to)| to).collect();
        let count = targets.len() as u32;
        // Distinct targets are 1..=count exactly when both ends line up
        let contiguous = targets.iter().next().map_or(true, |&first| first == 1)
            && targets.iter().next_back().map_or(true, |&last| last == count);
        if !contiguous {
            return fail(format!("level {} has orphan or dangling agg ids", level_id));
        }

        node_counts.insert(level_id, count);
        children = count;
    }

    Ok(node_counts)
}

fn check_policytc(tables: &CompiledTables, node_counts: &BTreeMap<u32, u32>) -> FmResult<()> {
    let profile_count = tables.fm_profile.len() as u32;
    check_contiguous("fm_profile", tables.fm_profile.iter().map(|r| r.policytc_id))?;

    let mut tuples: HashMap<(u32, [u64; 8]), u32> = HashMap::new();
    for row in &tables.fm_profile {
        let values = [
            row.deductible1,
            row.deductible2,
            row.deductible3,
            row.attachment1,
            row.limit1,
            row.share1,
            row.share2,
            row.share3,
        ]
        .map(f64::to_bits);
        if let Some(first) = tuples.insert((row.calcrule_id, values), row.policytc_id) {
            return fail(format!(
                "fm_profile rows {} and {} carry the same terms",
                first, row.policytc_id
            ));
        }
    }

    let mut covered: HashSet<(u32, u32)> = HashSet::new();
    let mut used: HashSet<u32> = HashSet::new();
    for row in &tables.fm_policytc {
        let nodes = node_counts.get(&row.level_id).copied().unwrap_or(0);
        if row.agg_id == 0 || row.agg_id > nodes {
            return fail(format!(
                "fm_policytc references missing node {} at level {}",
                row.agg_id, row.level_id
            ));
        }
        if row.policytc_id == 0 || row.policytc_id > profile_count {
            return fail(format!(
                "fm_policytc references missing profile {}",
                row.policytc_id
            ));
        }
        covered.insert((row.level_id, row.agg_id));
        used.insert(row.policytc_id);
    }

    let expected: u32 = node_counts.values().sum();
    if covered.len() as u32 != expected {
        return fail("node without a policytc assignment".to_string());
    }
    if used.len() as u32 != profile_count {
        return fail("fm_profile row not referenced by fm_policytc".to_string());
    }
    Ok(())
}

fn check_xref(tables: &CompiledTables, node_counts: &BTreeMap<u32, u32>) -> FmResult<()> {
    check_contiguous("fm_xref output", tables.fm_xref.iter().map(|r| r.output))?;
    check_contiguous(
        "fmsummaryxref output",
        tables.fmsummaryxref.iter().map(|r| r.output),
    )?;
    if tables.fm_xref.len() != tables.fmsummaryxref.len() {
        return fail("fmsummaryxref does not cover every output".to_string());
    }

    let leaves = node_counts.get(&1).copied().unwrap_or(0);
    let leaf_rows: HashSet<u32> = tables.fm_xref.iter().map(|r| r.agg_id).collect();
    if tables.fm_xref.iter().any(|r| r.agg_id == 0 || r.agg_id > leaves)
        || leaf_rows.len() as u32 != leaves
    {
        return fail("fm_xref does not map every level 1 node".to_string());
    }
    Ok(())
}
