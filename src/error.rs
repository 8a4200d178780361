//! Error types for the FM compilation pipeline

use thiserror::Error;

/// Broad classification of a failure, used by callers to decide whether a
/// run is worth re-attempting with corrected configuration or corrected data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Profile, catalogue or compile configuration is wrong
    Configuration,
    /// An input record is missing, malformed or references something unknown
    Data,
    /// The compiled tables violate an internal invariant
    Consistency,
    /// Reading or writing files failed
    Io,
}

#[derive(Error, Debug)]
pub enum FmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{table} row {row}: {source}")]
    Table {
        table: &'static str,
        row: usize,
        #[source]
        source: csv::Error,
    },

    // ---- Configuration ----
    #[error("Unknown term field '{0}'")]
    UnknownTermField(String),

    #[error("Invalid profile entry for '{field}': {reason}")]
    InvalidProfileEntry { field: String, reason: String },

    #[error(
        "Profile conflict at level {level_id}, term group {term_group}, {role}: \
         '{existing}' vs '{incoming}'"
    )]
    ProfileConflict {
        level_id: u8,
        term_group: u32,
        role: String,
        existing: String,
        incoming: String,
    },

    #[error("Invalid calc rule catalogue row {row}: {reason}")]
    InvalidCatalogueRow { row: usize, reason: String },

    #[error("Calc rule catalogue maps {presence} to both {first} and {second}")]
    CatalogueConflict {
        presence: String,
        first: u32,
        second: u32,
    },

    #[error(
        "Unsupported term combination {presence} at level {level_id}, agg {agg_id}, layer {layer_id}"
    )]
    UnsupportedTermCombination {
        level_id: u32,
        agg_id: u32,
        layer_id: u32,
        presence: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ---- Data ----
    #[error("{table} row {row}: {reason}")]
    InvalidRecord {
        table: &'static str,
        row: usize,
        reason: String,
    },

    #[error("Key row {row} references unknown location {loc_id}")]
    UnknownLocation { row: usize, loc_id: u32 },

    #[error("Location {loc_number} (row {row_id}) references unknown account {acc_number}")]
    UnknownAccount {
        row_id: u32,
        loc_number: String,
        acc_number: String,
    },

    #[error("Ratio-of-limit term '{field}' has no limit at level {level_id}, agg {agg_id}")]
    RatioWithoutLimit {
        field: String,
        level_id: u32,
        agg_id: u32,
    },

    // ---- Consistency ----
    #[error("Consistency violation: {0}")]
    Consistency(String),
}

impl FmError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FmError::Io(_) => ErrorKind::Io,
            FmError::Csv(e) if e.is_io_error() => ErrorKind::Io,
            FmError::Csv(_) | FmError::Table { .. } => ErrorKind::Data,
            FmError::Json(_) => ErrorKind::Configuration,
            FmError::UnknownTermField(_)
            | FmError::InvalidProfileEntry { .. }
            | FmError::ProfileConflict { .. }
            | FmError::InvalidCatalogueRow { .. }
            | FmError::CatalogueConflict { .. }
            | FmError::UnsupportedTermCombination { .. }
            | FmError::InvalidConfig(_) => ErrorKind::Configuration,
            FmError::InvalidRecord { .. }
            | FmError::UnknownLocation { .. }
            | FmError::UnknownAccount { .. }
            | FmError::RatioWithoutLimit { .. } => ErrorKind::Data,
            FmError::Consistency(_) => ErrorKind::Consistency,
        }
    }
}

pub type FmResult<T> = Result<T, FmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = FmError::ProfileConflict {
            level_id: 1,
            term_group: 1,
            role: "deductible1".into(),
            existing: "LocDed1Building".into(),
            incoming: "LocDed6All".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = FmError::UnknownLocation { row: 3, loc_id: 99 };
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(err.to_string().contains("99"));

        let err = FmError::Consistency("orphan".into());
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }
}
