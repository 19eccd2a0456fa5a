// src/resolver/reduce.rs

//! Diff reducer
//!
//! Turns a resolution closure into the list of units that actually have to
//! be copied: source units whose identity is not already in the target.

use super::closure::ResolutionClosure;
use crate::units::{IdentityKey, Origin, Unit};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Ordered, de-duplicated units to copy, dependencies first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CopyPlan {
    units: Vec<Unit>,
}

impl CopyPlan {
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Unit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn identity_keys(&self) -> Vec<IdentityKey> {
        self.units.iter().map(Unit::identity_key).collect()
    }

    /// NEVRA strings in plan order
    pub fn nevras(&self) -> Vec<String> {
        self.units.iter().map(Unit::nevra).collect()
    }
}

impl<'a> IntoIterator for &'a CopyPlan {
    type Item = &'a Unit;
    type IntoIter = std::slice::Iter<'a, Unit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Reduce `closure` to the units missing from the target repository
///
/// A unit is kept when its identity key is absent from `target_keys` and it
/// was loaded from the source repository.
pub fn reduce(closure: &ResolutionClosure, target_keys: &HashSet<IdentityKey>) -> CopyPlan {
    let units = closure.units();

    let plan: Vec<Unit> = closure
        .dependency_order()
        .into_iter()
        .map(|idx| &units[idx])
        .filter(|unit| unit.origin == Origin::Source)
        .filter(|unit| !target_keys.contains(&unit.identity_key()))
        .cloned()
        .collect();

    debug!(
        "Reduced closure of {} units to {} units to copy",
        units.len(),
        plan.len()
    );
    CopyPlan { units: plan }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::resolver::{resolve, Universe};
    use crate::units::{normalize_unit, RawUnit};

    fn simple(name: &str, evr: &str, requires: &[&str]) -> Unit {
        let raw = RawUnit {
            requires: requires.iter().map(|s| s.to_string()).collect(),
            ..RawUnit::rpm(name, evr)
        };
        normalize_unit(&raw).unwrap()
    }

    fn plan_for(source: Vec<Unit>, target: Vec<Unit>, requested: &str) -> CopyPlan {
        let universe = Universe::build(source, target).unwrap();
        let closure = resolve(&universe, requested, &ResolverConfig::default()).unwrap();
        reduce(&closure, universe.target_identity_keys())
    }

    #[test]
    fn test_target_units_are_filtered() {
        let plan = plan_for(
            vec![
                simple("penguin", "1.0", &["zoo-lib", "fish"]),
                simple("zoo-lib", "2.1", &[]),
                simple("fish", "1.0", &[]),
            ],
            vec![simple("fish", "1.0", &[])],
            "penguin",
        );
        assert_eq!(plan.nevras(), vec!["zoo-lib-2.1.noarch", "penguin-1.0.noarch"]);
    }

    #[test]
    fn test_ordering_passes_through_target_units() {
        // penguin -> ice (in target) -> water; water must still precede penguin
        let plan = plan_for(
            vec![
                simple("penguin", "1.0", &["ice"]),
                simple("water", "1.0", &[]),
            ],
            vec![simple("ice", "1.0", &["water"])],
            "penguin",
        );
        assert_eq!(plan.nevras(), vec!["water-1.0.noarch", "penguin-1.0.noarch"]);
    }

    #[test]
    fn test_target_only_seed_yields_empty_plan() {
        let plan = plan_for(Vec::new(), vec![simple("penguin", "1.0", &[])], "penguin");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_versions_ascending_for_same_name() {
        let plan = plan_for(
            vec![
                simple("penguin", "1.0", &["zoo-lib = 2.10", "zoo-lib = 2.9"]),
                simple("zoo-lib", "2.9", &[]),
                simple("zoo-lib", "2.10", &[]),
            ],
            Vec::new(),
            "penguin",
        );
        assert_eq!(
            plan.nevras(),
            vec!["zoo-lib-2.9.noarch", "zoo-lib-2.10.noarch", "penguin-1.0.noarch"]
        );
    }
}
