//! Deduplication of (calc rule, terms) tuples into shared policytc profiles

use super::extract::NodeTerms;
use std::collections::HashMap;

/// One fm_profile record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyTerm {
    pub policytc_id: u32,
    pub calcrule_id: u32,
    pub deductible1: f64,
    pub deductible2: f64,
    pub deductible3: f64,
    pub attachment1: f64,
    pub limit1: f64,
    pub share1: f64,
    pub share2: f64,
    pub share3: f64,
}

impl PolicyTerm {
    /// Amount columns are rounded to `places` when set; shares never are
    fn new(policytc_id: u32, calcrule_id: u32, terms: &NodeTerms, places: Option<u32>) -> Self {
        let amount = |value: Option<f64>| {
            let value = value.unwrap_or(0.0);
            normalize(match places {
                Some(places) => round_to(value, places),
                None => value,
            })
        };
        let ratio = |value: Option<f64>| normalize(value.unwrap_or(0.0));
        Self {
            policytc_id,
            calcrule_id,
            deductible1: amount(terms.deductible[0]),
            deductible2: amount(terms.deductible[1]),
            deductible3: amount(terms.deductible[2]),
            attachment1: amount(terms.attachment),
            limit1: amount(terms.limit),
            share1: ratio(terms.share[0]),
            share2: ratio(terms.share[1]),
            share3: ratio(terms.share[2]),
        }
    }

    fn key(&self) -> ProfileKey {
        ProfileKey {
            calcrule_id: self.calcrule_id,
            values: [
                self.deductible1.to_bits(),
                self.deductible2.to_bits(),
                self.deductible3.to_bits(),
                self.attachment1.to_bits(),
                self.limit1.to_bits(),
                self.share1.to_bits(),
                self.share2.to_bits(),
                self.share3.to_bits(),
            ],
        }
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn normalize(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Bit-exact identity of a profile tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ProfileKey {
    calcrule_id: u32,
    values: [u64; 8],
}

/// Assigns policytc ids in first-seen order, shared across levels
#[derive(Debug, Default)]
pub struct ProfileDeduplicator {
    ids: HashMap<ProfileKey, u32>,
    profiles: Vec<PolicyTerm>,
    places: Option<u32>,
}

impl ProfileDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduplicator keying on amounts rounded to `places` decimals, so tuples
    /// that only differ below the emitted precision share one profile
    pub fn with_rounding(places: Option<u32>) -> Self {
        Self {
            places,
            ..Self::default()
        }
    }

    /// Policytc id for a tuple, allocating the next id on first sight
    pub fn assign(&mut self, calcrule_id: u32, terms: &NodeTerms) -> u32 {
        let candidate = PolicyTerm::new(
            self.profiles.len() as u32 + 1,
            calcrule_id,
            terms,
            self.places,
        );
        let profiles = &mut self.profiles;
        *self.ids.entry(candidate.key()).or_insert_with(|| {
            profiles.push(candidate);
            candidate.policytc_id
        })
    }

    /// Profiles ordered by policytc id
    pub fn into_profiles(self) -> Vec<PolicyTerm> {
        self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_tuples_share_id() {
        let mut dedup = ProfileDeduplicator::new();
        let none = NodeTerms::default();
        let ded = NodeTerms {
            deductible: [Some(50_000.0), None, None],
            ..NodeTerms::default()
        };

        assert_eq!(dedup.assign(12, &none), 1);
        assert_eq!(dedup.assign(12, &ded), 2);
        assert_eq!(dedup.assign(12, &none), 1);
        assert_eq!(dedup.assign(12, &ded), 2);
        // Same terms under another rule are a different profile
        assert_eq!(dedup.assign(14, &ded), 3);

        let profiles = dedup.into_profiles();
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[1].deductible1, 50_000.0);
        assert_eq!(profiles[2].calcrule_id, 14);
    }

    #[test]
    fn test_absent_and_zero_terms_coincide() {
        let mut dedup = ProfileDeduplicator::new();
        let zero = NodeTerms {
            attachment: Some(-0.0),
            deductible: [Some(0.0), None, None],
            ..NodeTerms::default()
        };
        assert_eq!(dedup.assign(12, &NodeTerms::default()), 1);
        assert_eq!(dedup.assign(12, &zero), 1);
    }

    #[test]
    fn test_close_values_stay_distinct() {
        let mut dedup = ProfileDeduplicator::new();
        let a = NodeTerms {
            limit: Some(0.1 + 0.2),
            ..NodeTerms::default()
        };
        let b = NodeTerms {
            limit: Some(0.3),
            ..NodeTerms::default()
        };
        assert_ne!(dedup.assign(14, &a), dedup.assign(14, &b));
    }

    #[test]
    fn test_rounding_merges_tuples_before_keying() {
        let mut dedup = ProfileDeduplicator::with_rounding(Some(0));
        let low = NodeTerms {
            deductible: [Some(100.3), None, None],
            share: [Some(0.25), None, None],
            ..NodeTerms::default()
        };
        let high = NodeTerms {
            deductible: [Some(100.4), None, None],
            share: [Some(0.25), None, None],
            ..NodeTerms::default()
        };
        assert_eq!(dedup.assign(12, &low), 1);
        assert_eq!(dedup.assign(12, &high), 1);

        let profiles = dedup.into_profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].deductible1, 100.0);
        assert_eq!(profiles[0].share1, 0.25);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1234.5678, 2), 1234.57);
        assert_eq!(round_to(0.125, 0), 0.0);
        assert_eq!(round_to(99.5, 0), 100.0);
    }
}
