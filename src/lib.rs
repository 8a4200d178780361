//! FM Compiler - builds financial module input tables for catastrophe loss simulation
//!
//! This library provides:
//! - Loaders for canonical exposure, accounts and hazard-key tables
//! - Term profiles mapping source columns onto FM levels and term roles
//! - GUL item and coverage generation
//! - The FM aggregation hierarchy with per-node term extraction
//! - Calc rule selection and policytc profile deduplication
//! - Validated CSV emission of the eight FM input tables

pub mod compiler;
pub mod config;
pub mod error;
pub mod exposure;
pub mod fm;
pub mod gul;
pub mod output;
pub mod profile;

// Re-export commonly used types
pub use compiler::FmCompiler;
pub use config::{CompileConfig, SummaryGrouping};
pub use error::{ErrorKind, FmError, FmResult};
pub use exposure::SourceData;
pub use fm::{CalcRuleCatalogue, FmProgramme};
pub use gul::GulInputs;
pub use output::CompiledTables;
pub use profile::UnifiedProfile;
