//! Print the unified term profile and calc rule catalogue
//!
//! Useful for checking a profile directory before a compilation run.

use anyhow::{Context, Result};
use clap::Parser;
use fm_compiler::{profile::UnifiedProfile, CalcRuleCatalogue};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dump_profile", about = "Show the unified FM profile and calc rules")]
struct Args {
    /// Directory holding exposure_profile.csv and accounts_profile.csv
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Calc rule catalogue CSV
    #[arg(long)]
    calc_rules: Option<PathBuf>,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let profile = match &args.profile_dir {
        Some(dir) => UnifiedProfile::from_dir(dir)
            .with_context(|| format!("loading profiles from {}", dir.display()))?,
        None => UnifiedProfile::default_oed()?,
    };
    let catalogue = match &args.calc_rules {
        Some(path) => CalcRuleCatalogue::load(path)
            .with_context(|| format!("loading calc rules {}", path.display()))?,
        None => CalcRuleCatalogue::default(),
    };

    if args.json {
        let specs: Vec<_> = profile.specs().collect();
        let rules: Vec<_> = catalogue
            .iter()
            .map(|(presence, calcrule_id)| serde_json::json!({
                "presence": presence,
                "calcrule_id": calcrule_id,
            }))
            .collect();
        let dump = serde_json::json!({ "profile": specs, "calc_rules": rules });
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    println!("Unified profile ({} fields)", profile.len());
    println!("{:<14} {:>5} {:<18} {:<12} {:<18} {:>8} {:>12}",
        "Level", "Group", "Field", "Role", "Kind", "Nullable", "Default");
    println!("{}", "-".repeat(95));
    for spec in profile.specs() {
        println!("{:<14} {:>5} {:<18} {:<12} {:<18} {:>8} {:>12}",
            spec.level.name(),
            spec.term_group,
            spec.field.as_str(),
            spec.role.to_string(),
            spec.kind.as_str(),
            spec.nullable,
            spec.default_value.map(|v| v.to_string()).unwrap_or_default(),
        );
    }

    println!("\nCalc rules ({} combinations)", catalogue.len());
    println!("{:>8} {:>10} {:>7} {:>5} {:>5} {:>10}",
        "Calcrule", "Deductible", "Clamped", "Limit", "Share", "Attachment");
    for (presence, calcrule_id) in catalogue.iter() {
        println!("{:>8} {:>10} {:>7} {:>5} {:>5} {:>10}",
            calcrule_id,
            presence.deductible as u8,
            presence.deductible_clamped as u8,
            presence.limit as u8,
            presence.share as u8,
            presence.attachment as u8,
        );
    }

    Ok(())
}
