// src/resolver/universe.rs

//! Universe builder
//!
//! Combines the normalized units of the source and target repositories
//! into one indexed candidate pool.

use crate::error::{Error, Result};
use crate::units::{Capability, IdentityKey, Origin, Unit};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Index of a unit inside a `Universe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(usize);

/// All candidate units from both repositories
#[derive(Debug)]
pub struct Universe {
    units: Vec<Unit>,
    /// Capability name → units providing it
    provides: HashMap<String, Vec<UnitId>>,
    /// Unit name → units with that name
    names: HashMap<String, Vec<UnitId>>,
    /// Obsoleted name → units declaring the obsolete
    obsoletes: HashMap<String, Vec<UnitId>>,
    target_keys: HashSet<IdentityKey>,
}

impl Universe {
    /// Build a universe from source and target units
    ///
    /// A unit repeated with the same identity key and origin is kept once.
    /// Fails with `EmptyUniverse` only when both sides are empty.
    pub fn build(source: Vec<Unit>, target: Vec<Unit>) -> Result<Self> {
        if source.is_empty() && target.is_empty() {
            return Err(Error::EmptyUniverse);
        }

        let mut universe = Self {
            units: Vec::with_capacity(source.len() + target.len()),
            provides: HashMap::new(),
            names: HashMap::new(),
            obsoletes: HashMap::new(),
            target_keys: HashSet::new(),
        };
        let mut seen: HashSet<(IdentityKey, Origin)> = HashSet::new();

        let tagged = source
            .into_iter()
            .map(|u| u.with_origin(Origin::Source))
            .chain(target.into_iter().map(|u| u.with_origin(Origin::Target)));

        for unit in tagged {
            let key = unit.identity_key();
            if !seen.insert((key.clone(), unit.origin)) {
                warn!("Duplicate unit {} in {:?} repository, ignoring", key, unit.origin);
                continue;
            }
            if unit.origin == Origin::Target {
                universe.target_keys.insert(key);
            }
            universe.insert(unit);
        }

        debug!(
            "Built universe with {} units ({} in target)",
            universe.units.len(),
            universe.target_keys.len()
        );
        Ok(universe)
    }

    fn insert(&mut self, unit: Unit) {
        let id = UnitId(self.units.len());

        for cap in unit.effective_provides() {
            let ids = self.provides.entry(cap.name).or_default();
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        for obsolete in &unit.obsoletes {
            self.obsoletes.entry(obsolete.name.clone()).or_default().push(id);
        }
        self.names.entry(unit.name.clone()).or_default().push(id);

        self.units.push(unit);
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units whose name is exactly `name`
    pub fn by_name(&self, name: &str) -> &[UnitId] {
        self.names.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Units with a provide satisfying `required`, in insertion order
    pub fn providers(&self, required: &Capability) -> Vec<UnitId> {
        self.provides
            .get(&required.name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.unit(id).provides_capability(required))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Units declaring an obsolete that matches `unit`
    pub fn obsoleters_of(&self, unit: &Unit) -> Vec<UnitId> {
        self.obsoletes
            .get(&unit.name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.unit(id).obsoletes_unit(unit))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Identity keys of everything loaded from the target repository
    pub fn target_identity_keys(&self) -> &HashSet<IdentityKey> {
        &self.target_keys
    }

    pub fn is_in_target(&self, key: &IdentityKey) -> bool {
        self.target_keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{normalize_unit, RawUnit};

    fn unit(name: &str, evr: &str, provides: &[&str]) -> Unit {
        let raw = RawUnit {
            provides: provides.iter().map(|s| s.to_string()).collect(),
            ..RawUnit::rpm(name, evr)
        };
        normalize_unit(&raw).unwrap()
    }

    #[test]
    fn test_empty_universe() {
        let err = Universe::build(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyUniverse));
    }

    #[test]
    fn test_empty_target_is_valid() {
        let universe = Universe::build(vec![unit("penguin", "1.0", &[])], Vec::new()).unwrap();
        assert_eq!(universe.len(), 1);
        assert!(universe.target_identity_keys().is_empty());
    }

    #[test]
    fn test_empty_source_is_valid() {
        let universe = Universe::build(Vec::new(), vec![unit("penguin", "1.0", &[])]).unwrap();
        assert_eq!(universe.unit(universe.by_name("penguin")[0]).origin, Origin::Target);
    }

    #[test]
    fn test_origin_tagging_and_shared_keys() {
        let universe = Universe::build(
            vec![unit("zoo-lib", "2.1", &[])],
            vec![unit("zoo-lib", "2.1", &[])],
        )
        .unwrap();
        let ids = universe.by_name("zoo-lib");
        assert_eq!(ids.len(), 2);
        assert_eq!(universe.unit(ids[0]).origin, Origin::Source);
        assert_eq!(universe.unit(ids[1]).origin, Origin::Target);
        assert!(universe.is_in_target(&universe.unit(ids[0]).identity_key()));
    }

    #[test]
    fn test_duplicates_within_one_origin_are_dropped() {
        let universe = Universe::build(
            vec![unit("zoo-lib", "2.1", &[]), unit("zoo-lib", "2.1", &[])],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(universe.len(), 1);
    }

    #[test]
    fn test_providers_lookup() {
        let universe = Universe::build(
            vec![
                unit("zoo-lib", "2.1", &["zoo-lib = 2.1", "libzoo.so.2"]),
                unit("zoo-lib-old", "1.0", &["zoo-lib = 1.0"]),
                unit("penguin", "1.0", &[]),
            ],
            Vec::new(),
        )
        .unwrap();

        let req = Capability::parse("zoo-lib >= 2.0").unwrap();
        let providers = universe.providers(&req);
        assert_eq!(providers.len(), 1);
        assert_eq!(universe.unit(providers[0]).name, "zoo-lib");

        // Self-provide for units without explicit provides
        let req = Capability::parse("penguin").unwrap();
        assert_eq!(universe.providers(&req).len(), 1);

        let req = Capability::parse("missing").unwrap();
        assert!(universe.providers(&req).is_empty());
    }

    #[test]
    fn test_obsoleters_lookup() {
        let mut raw = RawUnit::rpm("walrus", "2.0");
        raw.obsoletes = vec!["seal < 2.0".to_string()];
        let walrus = normalize_unit(&raw).unwrap();
        let seal = unit("seal", "1.0", &[]);

        let universe = Universe::build(vec![walrus, seal.clone()], Vec::new()).unwrap();
        let obsoleters = universe.obsoleters_of(&seal);
        assert_eq!(obsoleters.len(), 1);
        assert_eq!(universe.unit(obsoleters[0]).name, "walrus");
    }
}
