//! FM Compiler CLI
//!
//! Compiles exposure, accounts and keys tables into the FM input tables

use anyhow::{Context, Result};
use clap::Parser;
use fm_compiler::{
    profile::UnifiedProfile, CalcRuleCatalogue, CompileConfig, FmCompiler, SourceData,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "fm_compiler", version, about = "Compile FM input tables for loss simulation")]
struct Args {
    /// Canonical exposure (locations) CSV
    #[arg(long)]
    exposure: PathBuf,

    /// Canonical accounts CSV
    #[arg(long)]
    accounts: PathBuf,

    /// Keys CSV from the hazard lookup
    #[arg(long)]
    keys: PathBuf,

    /// Directory the eight tables are written to
    #[arg(long)]
    output_dir: PathBuf,

    /// Directory holding exposure_profile.csv and accounts_profile.csv
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Calc rule catalogue CSV
    #[arg(long)]
    calc_rules: Option<PathBuf>,

    /// JSON compile configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop unknown keys and locations without accounts instead of failing
    #[arg(long)]
    allow_partial: bool,

    /// Emit inactive FM levels as pass-through levels
    #[arg(long)]
    materialize_empty_levels: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => CompileConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CompileConfig::default(),
    };
    config.allow_partial_runs |= args.allow_partial;
    config.materialize_empty_levels |= args.materialize_empty_levels;

    let mut compiler = FmCompiler::new()?.with_config(config);
    if let Some(dir) = &args.profile_dir {
        let profile = UnifiedProfile::from_dir(dir)
            .with_context(|| format!("loading profiles from {}", dir.display()))?;
        compiler = compiler.with_profile(profile);
    }
    if let Some(path) = &args.calc_rules {
        let catalogue = CalcRuleCatalogue::load(path)
            .with_context(|| format!("loading calc rules {}", path.display()))?;
        compiler = compiler.with_catalogue(catalogue);
    }

    let source = SourceData::load(&args.exposure, &args.accounts, &args.keys)
        .context("loading source tables")?;

    let paths = compiler
        .compile_to_dir(&source, &args.output_dir)
        .with_context(|| format!("compiling into {}", args.output_dir.display()))?;

    println!("FM Compiler v{}", env!("CARGO_PKG_VERSION"));
    println!("===================\n");
    for (name, path) in &paths {
        println!("  {:<16} {}", name, path.display());
    }
    println!("\nTotal time: {:?}", start.elapsed());

    Ok(())
}
