// SPDX-License-Identifier: MIT
//! Height-aware commit, prune and version decisions for module stores.
//!
//! A module that is switched on mid-chain has no state before its activation
//! height. Replaying history must not see writes from those blocks, must not
//! prune snapshots taken before the module existed, and must not invent a
//! version floor for a module that was never activated.
use std::collections::BTreeSet;

use vmbridge_types::constants::{MODULE_NAME, WASM_MODULE_NAME};
use vmbridge_types::height::{ActivationHeight, HeightPhase};
use vmbridge_types::types::StoreFilterDecision;

/// A store that records the height at which its module came into existence.
pub trait VersionStamp {
    fn set_upgrade_version(&mut self, height: u64);
    fn upgrade_version(&self) -> Option<u64>;
}

/// Commit, prune and version filters for a set of modules that share one
/// activation height. Modules outside the set are never filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFilters {
    activation: ActivationHeight,
    modules: BTreeSet<String>,
}

impl StoreFilters {
    pub fn new<I, S>(activation: ActivationHeight, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StoreFilters {
            activation,
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    /// Filters for the bridge and the WASM runtime store.
    pub fn bridge(activation: ActivationHeight) -> Self {
        Self::new(activation, [MODULE_NAME, WASM_MODULE_NAME])
    }

    pub fn activation(&self) -> ActivationHeight {
        self.activation
    }

    pub fn governs(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    /// Commit filter. At the activation height the store is stamped with its
    /// upgrade version; a second evaluation at that height leaves the stamp alone.
    pub fn commit(
        &self,
        module: &str,
        height: u64,
        store: Option<&mut dyn VersionStamp>,
    ) -> StoreFilterDecision {
        if !self.governs(module) {
            return StoreFilterDecision::Include;
        }
        match self.activation.phase(height) {
            HeightPhase::Before => StoreFilterDecision::Exclude,
            HeightPhase::At => {
                if let Some(store) = store {
                    if store.upgrade_version().is_none() {
                        store.set_upgrade_version(height);
                    }
                }
                StoreFilterDecision::IncludeAndStamp
            }
            HeightPhase::After => StoreFilterDecision::Include,
        }
    }

    /// Prune filter: versions recorded before activation are kept.
    pub fn may_prune(&self, module: &str, height: u64) -> bool {
        !self.governs(module) || self.activation.phase(height).is_live()
    }

    /// Version filter: one `(module, activation height)` floor per governed
    /// module, or nothing at all when the activation height is unset.
    pub fn versions(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        let floor = self.activation.height();
        self.modules
            .iter()
            .filter_map(move |module| floor.map(|h| (module.as_str(), h)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Stamp {
        version: Option<u64>,
        writes: usize,
    }

    impl VersionStamp for Stamp {
        fn set_upgrade_version(&mut self, height: u64) {
            self.version = Some(height);
            self.writes += 1;
        }

        fn upgrade_version(&self) -> Option<u64> {
            self.version
        }
    }

    #[test]
    fn test_commit_before_at_after() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        let mut stamp = Stamp::default();

        assert_eq!(
            filters.commit(MODULE_NAME, 99, Some(&mut stamp)),
            StoreFilterDecision::Exclude
        );
        assert_eq!(stamp.version, None);

        assert_eq!(
            filters.commit(MODULE_NAME, 100, Some(&mut stamp)),
            StoreFilterDecision::IncludeAndStamp
        );
        assert_eq!(stamp.version, Some(100));

        assert_eq!(
            filters.commit(MODULE_NAME, 101, Some(&mut stamp)),
            StoreFilterDecision::Include
        );
        assert_eq!(stamp.writes, 1);
    }

    #[test]
    fn test_commit_at_activation_is_idempotent() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        let mut stamp = Stamp::default();
        for _ in 0..2 {
            assert_eq!(
                filters.commit(WASM_MODULE_NAME, 100, Some(&mut stamp)),
                StoreFilterDecision::IncludeAndStamp
            );
        }
        assert_eq!(stamp.version, Some(100));
        assert_eq!(stamp.writes, 1);
    }

    #[test]
    fn test_commit_without_store() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        assert_eq!(
            filters.commit(MODULE_NAME, 100, None),
            StoreFilterDecision::IncludeAndStamp
        );
    }

    #[test]
    fn test_other_modules_pass_through() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        assert_eq!(
            filters.commit("evm", 1, None),
            StoreFilterDecision::Include
        );
        assert!(filters.may_prune("evm", 1));
    }

    #[test]
    fn test_unset_activation_denies() {
        let filters = StoreFilters::bridge(ActivationHeight::Unset);
        let mut stamp = Stamp::default();
        for h in [0, 1, 1_000_000] {
            assert_eq!(
                filters.commit(MODULE_NAME, h, Some(&mut stamp)),
                StoreFilterDecision::Exclude
            );
            assert!(!filters.may_prune(MODULE_NAME, h));
        }
        assert_eq!(stamp.version, None);
    }

    #[test]
    fn test_prune_filter() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        assert!(!filters.may_prune(MODULE_NAME, 50));
        assert!(!filters.may_prune(MODULE_NAME, 99));
        assert!(filters.may_prune(MODULE_NAME, 100));
        assert!(filters.may_prune(MODULE_NAME, 150));
    }

    #[test]
    fn test_versions_unset_is_empty() {
        let filters = StoreFilters::bridge(ActivationHeight::Unset);
        assert_eq!(filters.versions().count(), 0);
    }

    #[test]
    fn test_versions_floor_per_module() {
        let filters = StoreFilters::bridge(ActivationHeight::At(100));
        let versions: Vec<(&str, u64)> = filters.versions().collect();
        assert_eq!(versions, vec![(MODULE_NAME, 100), (WASM_MODULE_NAME, 100)]);
    }
}
