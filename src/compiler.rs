//! Compiler front end
//!
//! Pre-loads profiles, the calc rule catalogue and configuration once, then
//! compiles any number of source bundles without re-reading them.

use crate::config::CompileConfig;
use crate::error::FmResult;
use crate::exposure::SourceData;
use crate::fm::{validate::validate_tables, CalcRuleCatalogue, FmProgramme};
use crate::gul::build_gul_inputs;
use crate::output::CompiledTables;
use crate::profile::UnifiedProfile;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pre-loaded FM compiler
///
/// # Example
/// ```ignore
/// let compiler = FmCompiler::new()?.with_config(config);
/// let source = SourceData::load(&exposure, &accounts, &keys)?;
/// let tables = compiler.compile(&source)?;
/// tables.write_to_dir(&output_dir)?;
/// ```
#[derive(Debug, Clone)]
pub struct FmCompiler {
    profile: UnifiedProfile,
    catalogue: CalcRuleCatalogue,
    config: CompileConfig,
}

impl FmCompiler {
    /// Compiler with the built-in profiles, catalogue and default config
    pub fn new() -> FmResult<Self> {
        Ok(Self {
            profile: UnifiedProfile::default_oed()?,
            catalogue: CalcRuleCatalogue::default(),
            config: CompileConfig::default(),
        })
    }

    /// Compiler loading `profiles/` and `calc_rules.csv` from a data directory
    pub fn from_dir(path: &Path) -> FmResult<Self> {
        Ok(Self {
            profile: UnifiedProfile::from_dir(&path.join("profiles"))?,
            catalogue: CalcRuleCatalogue::load(path.join("calc_rules.csv"))?,
            config: CompileConfig::default(),
        })
    }

    pub fn with_profile(mut self, profile: UnifiedProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_catalogue(mut self, catalogue: CalcRuleCatalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn with_config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile one source bundle into a validated table set
    pub fn compile(&self, source: &SourceData) -> FmResult<CompiledTables> {
        let start = Instant::now();

        let gul = build_gul_inputs(source, &self.config)?;
        let programme = FmProgramme::build(
            &gul,
            source,
            &self.profile,
            &self.catalogue,
            &self.config,
        )?;
        let tables = CompiledTables::assemble(&gul, &programme, source, &self.config);
        validate_tables(&tables)?;

        log::info!(
            "Compiled {} items, {} levels, {} profiles, {} outputs in {:?}",
            tables.items.len(),
            tables.level_count(),
            tables.fm_profile.len(),
            tables.fm_xref.len(),
            start.elapsed()
        );
        Ok(tables)
    }

    /// Compile and write all eight tables into a directory
    pub fn compile_to_dir(
        &self,
        source: &SourceData,
        dir: &Path,
    ) -> FmResult<BTreeMap<&'static str, PathBuf>> {
        self.compile(source)?.write_to_dir(dir)
    }

    /// Compile independent source bundles in parallel, results in input order
    pub fn compile_batch(&self, sources: &[SourceData]) -> Vec<FmResult<CompiledTables>> {
        sources.par_iter().map(|source| self.compile(source)).collect()
    }

    pub fn profile(&self) -> &UnifiedProfile {
        &self.profile
    }

    pub fn catalogue(&self) -> &CalcRuleCatalogue {
        &self.catalogue
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Mutable config for per-run tweaks
    pub fn config_mut(&mut self) -> &mut CompileConfig {
        &mut self.config
    }
}
