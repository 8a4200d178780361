//! Merge of exposure-side and account-side profiles keyed by level and term group

use super::terms::{FieldSpec, FmLevel, TermRole};
use crate::error::{FmError, FmResult};
use std::collections::BTreeMap;

/// Field specs for one (level, term group), keyed by role
pub type TermGroup = BTreeMap<TermRole, FieldSpec>;

/// Unified `(FmLevel, term_group) -> {role -> field spec}` mapping
#[derive(Debug, Clone, Default)]
pub struct UnifiedProfile {
    groups: BTreeMap<(FmLevel, u32), TermGroup>,
}

impl UnifiedProfile {
    /// Merge any number of profiles, rejecting conflicting or misplaced entries
    pub fn build<'a, I>(profiles: I) -> FmResult<Self>
    where
        I: IntoIterator<Item = &'a [FieldSpec]>,
    {
        let mut unified = Self::default();
        for profile in profiles {
            for spec in profile {
                unified.insert(spec.clone())?;
            }
        }
        Ok(unified)
    }

    fn insert(&mut self, spec: FieldSpec) -> FmResult<()> {
        let invalid = |reason: String| FmError::InvalidProfileEntry {
            field: spec.field.to_string(),
            reason,
        };

        if spec.field.source() != spec.level.source() {
            return Err(invalid(format!(
                "{:?} field cannot be used at level {}",
                spec.field.source(),
                spec.level
            )));
        }
        if spec.term_group < 1 || spec.term_group > spec.level.max_term_group() {
            return Err(invalid(format!(
                "term group {} is outside 1..={} for level {}",
                spec.term_group,
                spec.level.max_term_group(),
                spec.level
            )));
        }
        if !spec.role.is_valid() {
            return Err(invalid(format!("role {:?} has no fm_profile column", spec.role)));
        }
        if let Some(default) = spec.default_value {
            if !default.is_finite() || default < 0.0 {
                return Err(invalid(format!("default value {} is invalid", default)));
            }
        }

        let group = self
            .groups
            .entry((spec.level, spec.term_group))
            .or_default();

        match group.get(&spec.role) {
            Some(existing) if existing.same_definition(&spec) => Ok(()),
            Some(existing) => Err(FmError::ProfileConflict {
                level_id: spec.level.id(),
                term_group: spec.term_group,
                role: spec.role.to_string(),
                existing: existing.field.to_string(),
                incoming: spec.field.to_string(),
            }),
            None => {
                group.insert(spec.role, spec);
                Ok(())
            }
        }
    }

    /// Specs of one term group, if the profile defines it
    pub fn group(&self, level: FmLevel, term_group: u32) -> Option<&TermGroup> {
        self.groups.get(&(level, term_group))
    }

    /// Every spec defined for a level, across its term groups
    pub fn level_specs(&self, level: FmLevel) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.groups
            .range((level, 0)..=(level, u32::MAX))
            .flat_map(|(_, group)| group.values())
    }

    /// Whether the profile has any field at a level
    pub fn defines(&self, level: FmLevel) -> bool {
        self.level_specs(level).next().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(FmLevel, u32), &TermGroup)> + '_ {
        self.groups.iter()
    }

    /// Every spec in (level, term group, role) order
    pub fn specs(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.groups.values().flat_map(|group| group.values())
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
