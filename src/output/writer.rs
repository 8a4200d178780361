//! CSV writers for the compiled tables

use super::tables::{CompiledTables, TableRow};
use crate::error::{FmError, FmResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write one table, header included even when there are no rows
pub fn write_table<W: Write, T: TableRow>(writer: W, rows: &[T]) -> FmResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(T::HEADER)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl CompiledTables {
    /// Visit every table as (name, serialized bytes), in emission order
    fn for_each_table<F>(&self, mut emit: F) -> FmResult<()>
    where
        F: FnMut(&'static str, Vec<u8>) -> FmResult<()>,
    {
        fn bytes<T: TableRow>(rows: &[T]) -> FmResult<Vec<u8>> {
            let mut buffer = Vec::new();
            write_table(&mut buffer, rows)?;
            Ok(buffer)
        }

        emit(super::ItemRow::NAME, bytes(&self.items)?)?;
        emit(super::CoverageRow::NAME, bytes(&self.coverages)?)?;
        emit(super::GulSummaryXrefRow::NAME, bytes(&self.gulsummaryxref)?)?;
        emit(super::FmProgrammeRow::NAME, bytes(&self.fm_programme)?)?;
        emit(super::FmProfileRow::NAME, bytes(&self.fm_profile)?)?;
        emit(super::FmPolicyTcRow::NAME, bytes(&self.fm_policytc)?)?;
        emit(super::FmXrefRow::NAME, bytes(&self.fm_xref)?)?;
        emit(super::FmSummaryXrefRow::NAME, bytes(&self.fmsummaryxref)?)?;
        Ok(())
    }

    /// Serialize every table in memory, keyed by table name
    pub fn to_buffers(&self) -> FmResult<BTreeMap<&'static str, Vec<u8>>> {
        let mut buffers = BTreeMap::new();
        self.for_each_table(|name, bytes| {
            buffers.insert(name, bytes);
            Ok(())
        })?;
        Ok(buffers)
    }

    /// Write all tables into `dir` as `<name>.csv`
    ///
    /// Every table is first written to `<name>.csv.tmp`. The files are then
    /// renamed into place one by one, each replaced table kept as
    /// `<name>.csv.bak` until the whole set is in. If any rename fails, the
    /// tables already replaced are restored from their backups, so the
    /// directory holds either the complete new set or the previous one.
    pub fn write_to_dir(&self, dir: &Path) -> FmResult<BTreeMap<&'static str, PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut staged: Vec<StagedTable> = Vec::new();
        let result = self.for_each_table(|name, bytes| {
            let table = StagedTable::new(dir, name);
            fs::write(&table.tmp, bytes)?;
            staged.push(table);
            Ok(())
        });

        if let Err(e) = result {
            discard(&staged);
            return Err(e);
        }

        let mut committed: Vec<(&StagedTable, bool)> = Vec::new();
        for table in &staged {
            if let Err(e) = commit(table, &mut committed) {
                roll_back(&committed);
                discard(&staged);
                return Err(FmError::Io(e));
            }
        }

        let mut paths = BTreeMap::new();
        for (table, had_previous) in &committed {
            if *had_previous {
                if let Err(e) = fs::remove_file(&table.backup) {
                    log::warn!("Could not remove {}: {}", table.backup.display(), e);
                }
            }
            paths.insert(table.name, table.target.clone());
        }

        log::info!("Wrote {} tables to {}", paths.len(), dir.display());
        Ok(paths)
    }
}

struct StagedTable {
    name: &'static str,
    tmp: PathBuf,
    target: PathBuf,
    backup: PathBuf,
}

impl StagedTable {
    fn new(dir: &Path, name: &'static str) -> Self {
        Self {
            name,
            tmp: dir.join(format!("{}.csv.tmp", name)),
            target: dir.join(format!("{}.csv", name)),
            backup: dir.join(format!("{}.csv.bak", name)),
        }
    }
}

/// Move the previous table aside, then the new one into place
fn commit<'a>(
    table: &'a StagedTable,
    committed: &mut Vec<(&'a StagedTable, bool)>,
) -> io::Result<()> {
    let had_previous = table.target.exists();
    if had_previous {
        fs::rename(&table.target, &table.backup)?;
    }
    committed.push((table, had_previous));
    fs::rename(&table.tmp, &table.target)
}

/// Undo committed renames, newest first
fn roll_back(committed: &[(&StagedTable, bool)]) {
    for (table, had_previous) in committed.iter().rev() {
        let restored = if *had_previous {
            fs::rename(&table.backup, &table.target)
        } else if table.target.exists() {
            fs::remove_file(&table.target)
        } else {
            Ok(())
        };
        if let Err(e) = restored {
            log::warn!("Could not restore {}: {}", table.target.display(), e);
        }
    }
}

fn discard(staged: &[StagedTable]) {
    for table in staged {
        if table.tmp.exists() {
            if let Err(e) = fs::remove_file(&table.tmp) {
                log::warn!("Could not remove {}: {}", table.tmp.display(), e);
            }
        }
    }
}
