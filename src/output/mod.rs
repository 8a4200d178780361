//! Emitted tables: row types, assembly and CSV writing

mod tables;
mod writer;

pub use tables::{
    CompiledTables, CoverageRow, FmPolicyTcRow, FmProfileRow, FmProgrammeRow, FmSummaryXrefRow,
    FmXrefRow, GulSummaryXrefRow, ItemRow, TableRow, SUMMARYSET_ID,
};
pub use writer::write_table;
