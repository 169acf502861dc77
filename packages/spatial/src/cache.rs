//! Containment mask cache.
//!
//! Masks are index-aligned with the grid they were computed on, so entries
//! are keyed by both the caller's region key and the grid fingerprint. A
//! lookup against a different grid (another indicator, or a zero-filtered
//! event) misses instead of returning a misaligned mask.

use std::collections::BTreeMap;

use crate::GridFingerprint;

/// Whether a containment call may use the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always compute the mask and do not store it.
    Disabled,
    /// Reuse or store the mask under this region key.
    Enabled(String),
}

impl CachePolicy {
    /// Shorthand for [`CachePolicy::Enabled`].
    #[must_use]
    pub fn keyed(key: impl Into<String>) -> Self {
        Self::Enabled(key.into())
    }
}

/// Hit/miss counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that computed a fresh mask (including uncached calls).
    pub misses: u64,
}

/// Boolean containment masks for one country/indicator run.
///
/// Owned by the run that uses it and cleared before the next one; cache
/// keys are only unique within a country.
#[derive(Debug, Default)]
pub struct ContainmentCache {
    masks: BTreeMap<(String, GridFingerprint), Vec<bool>>,
    stats: CacheStats,
}

impl ContainmentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every stored mask and resets the counters.
    pub fn clear(&mut self) {
        self.masks.clear();
        self.stats = CacheStats::default();
    }

    /// Number of stored masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Whether no masks are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Current counters.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns the mask for `key` on `grid`, computing and storing it with
    /// `compute` on a miss.
    pub(crate) fn get_or_compute(
        &mut self,
        policy: &CachePolicy,
        grid: &GridFingerprint,
        compute: impl FnOnce() -> Vec<bool>,
    ) -> std::borrow::Cow<'_, [bool]> {
        let CachePolicy::Enabled(key) = policy else {
            self.stats.misses += 1;
            return std::borrow::Cow::Owned(compute());
        };

        let entry_key = (key.clone(), grid.clone());
        if self.masks.contains_key(&entry_key) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            let mask = compute();
            self.masks.insert(entry_key.clone(), mask);
        }

        std::borrow::Cow::Borrowed(self.masks[&entry_key].as_slice())
    }
}
