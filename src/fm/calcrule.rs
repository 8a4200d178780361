//! Calc rule selection from term presence

use crate::error::{FmError, FmResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default path of the calc rule catalogue
pub const DEFAULT_CALC_RULES_PATH: &str = "data/calc_rules.csv";

/// Which terms a node carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct TermPresence {
    pub deductible: bool,
    /// Minimum or maximum deductible present
    pub deductible_clamped: bool,
    pub limit: bool,
    pub share: bool,
    pub attachment: bool,
}

impl fmt::Display for TermPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(deductible={}, clamped={}, limit={}, share={}, attachment={})",
            self.deductible as u8,
            self.deductible_clamped as u8,
            self.limit as u8,
            self.share as u8,
            self.attachment as u8
        )
    }
}

#[derive(Debug, serde::Deserialize)]
struct CatalogueCsvRow {
    calcrule_id: u32,
    deductible: u8,
    deductible_clamped: u8,
    limit: u8,
    share: u8,
    attachment: u8,
}

impl CatalogueCsvRow {
    fn to_entry(&self, row: usize) -> FmResult<(TermPresence, u32)> {
        let flag = |name: &str, value: u8| match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FmError::InvalidCatalogueRow {
                row,
                reason: format!("{} must be 0 or 1, got {}", name, other),
            }),
        };

        Ok((
            TermPresence {
                deductible: flag("deductible", self.deductible)?,
                deductible_clamped: flag("deductible_clamped", self.deductible_clamped)?,
                limit: flag("limit", self.limit)?,
                share: flag("share", self.share)?,
                attachment: flag("attachment", self.attachment)?,
            },
            self.calcrule_id,
        ))
    }
}

/// Total mapping from supported presence vectors to calc rule ids
#[derive(Debug, Clone, PartialEq)]
pub struct CalcRuleCatalogue {
    rules: BTreeMap<TermPresence, u32>,
}

impl CalcRuleCatalogue {
    /// Build from (presence, calcrule) pairs; a vector mapped to two rules is an error
    pub fn from_entries<I>(entries: I) -> FmResult<Self>
    where
        I: IntoIterator<Item = (TermPresence, u32)>,
    {
        let mut rules = BTreeMap::new();
        for (presence, calcrule_id) in entries {
            match rules.get(&presence) {
                Some(&first) if first != calcrule_id => {
                    return Err(FmError::CatalogueConflict {
                        presence: presence.to_string(),
                        first,
                        second: calcrule_id,
                    })
                }
                Some(_) => {}
                None => {
                    rules.insert(presence, calcrule_id);
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn from_reader<R: Read>(reader: R) -> FmResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (idx, result) in csv_reader.deserialize().enumerate() {
            let row: CatalogueCsvRow = result.map_err(|source| FmError::Table {
                table: "calc_rules",
                row: idx + 1,
                source,
            })?;
            entries.push(row.to_entry(idx + 1)?);
        }

        Self::from_entries(entries)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> FmResult<Self> {
        Self::from_reader(File::open(path)?)
    }

    /// Calc rule for a presence vector, if supported
    pub fn select(&self, presence: &TermPresence) -> Option<u32> {
        self.rules.get(presence).copied()
    }

    /// Calc rule for a node, failing on unsupported combinations
    pub fn classify(
        &self,
        presence: &TermPresence,
        level_id: u32,
        agg_id: u32,
        layer_id: u32,
    ) -> FmResult<u32> {
        self.select(presence)
            .ok_or_else(|| FmError::UnsupportedTermCombination {
                level_id,
                agg_id,
                layer_id,
                presence: presence.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TermPresence, &u32)> + '_ {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CalcRuleCatalogue {
    /// Built-in catalogue, equal to data/calc_rules.csv
    fn default() -> Self {
        let p = |deductible, limit, share, attachment| TermPresence {
            deductible,
            deductible_clamped: false,
            limit,
            share,
            attachment,
        };
        Self {
            rules: BTreeMap::from([
                (p(false, false, false, false), 12),
                (p(true, false, false, false), 12),
                (p(true, true, false, false), 1),
                (p(false, true, false, false), 14),
                (p(false, true, true, false), 2),
                (p(false, true, true, true), 2),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = "\
calcrule_id,deductible,deductible_clamped,limit,share,attachment
12,0,0,0,0,0
12,1,0,0,0,0
1,1,0,1,0,0
14,0,0,1,0,0
2,0,0,1,1,0
2,0,0,1,1,1
";

    #[test]
    fn test_csv_matches_default() {
        let loaded = CalcRuleCatalogue::from_reader(CATALOGUE.as_bytes()).unwrap();
        assert_eq!(loaded, CalcRuleCatalogue::default());
        assert_eq!(loaded.len(), 6);
    }

    #[test]
    fn test_select() {
        let catalogue = CalcRuleCatalogue::default();
        let ded_limit = TermPresence {
            deductible: true,
            limit: true,
            ..TermPresence::default()
        };
        assert_eq!(catalogue.select(&ded_limit), Some(1));
        assert_eq!(catalogue.select(&TermPresence::default()), Some(12));
    }

    #[test]
    fn test_unsupported_combination_names_node() {
        let catalogue = CalcRuleCatalogue::default();
        let clamped = TermPresence {
            deductible: true,
            deductible_clamped: true,
            ..TermPresence::default()
        };
        let err = catalogue.classify(&clamped, 3, 7, 2).unwrap_err();
        match err {
            FmError::UnsupportedTermCombination {
                level_id,
                agg_id,
                layer_id,
                ..
            } => assert_eq!((level_id, agg_id, layer_id), (3, 7, 2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflicting_rows_rejected() {
        let csv = "calcrule_id,deductible,deductible_clamped,limit,share,attachment\n\
                   12,0,0,0,0,0\n\
                   14,0,0,0,0,0\n";
        assert!(matches!(
            CalcRuleCatalogue::from_reader(csv.as_bytes()),
            Err(FmError::CatalogueConflict { first: 12, second: 14, .. })
        ));

        let csv = "calcrule_id,deductible,deductible_clamped,limit,share,attachment\n\
                   12,2,0,0,0,0\n";
        assert!(matches!(
            CalcRuleCatalogue::from_reader(csv.as_bytes()),
            Err(FmError::InvalidCatalogueRow { row: 1, .. })
        ));
    }
}
