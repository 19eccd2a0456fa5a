// src/resolver/mod.rs

//! Dependency resolution for repository copies
//!
//! Given a universe of candidate units and a requested unit name, compute
//! the closure of units that must exist in the target repository, then
//! reduce it to the units that actually have to be copied.
//!
//! The resolver is breadth-first and never backtracks: each requirement is
//! satisfied by the closure if possible, otherwise by the best candidate in
//! the universe. Candidates already present in the target repository are
//! preferred, then the highest EVR, then the preferred architecture.

mod closure;
mod plan;
mod reduce;
mod universe;

pub use closure::{ObsoleteNote, ResolutionClosure, SupplementNote, UnsatisfiedDependency};
pub use plan::{plan_copy, ResolutionReport};
pub use reduce::{reduce, CopyPlan};
pub use universe::{UnitId, Universe};

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::units::{Capability, Dependency, Origin, Unit, UnitKind};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Resolve the closure of `requested` within `universe`
pub fn resolve(
    universe: &Universe,
    requested: &str,
    config: &ResolverConfig,
) -> Result<ResolutionClosure> {
    Resolver::new(universe, config, requested).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strength {
    Required,
    Weak,
}

/// A dependency waiting to be resolved
struct Pending {
    requirer: usize,
    dependency: Dependency,
    strength: Strength,
}

struct Resolver<'a> {
    universe: &'a Universe,
    config: &'a ResolverConfig,
    closure: ResolutionClosure,
    queue: VecDeque<Pending>,
}

impl<'a> Resolver<'a> {
    fn new(universe: &'a Universe, config: &'a ResolverConfig, requested: &str) -> Self {
        Self {
            universe,
            config,
            closure: ResolutionClosure::new(requested),
            queue: VecDeque::new(),
        }
    }

    fn run(mut self) -> Result<ResolutionClosure> {
        let requested = self.closure.requested().to_string();

        let candidates: Vec<UnitId> = self
            .universe
            .by_name(&requested)
            .iter()
            .copied()
            .filter(|&id| self.is_compatible(id))
            .collect();

        let seed = self
            .select_best(&candidates)
            .ok_or_else(|| Error::NoMatchingUnit(requested.clone()))?;

        let seed_unit = self.universe.unit(seed);
        info!(
            "Selected {} for '{}' ({} candidates){}",
            seed_unit,
            requested,
            candidates.len(),
            if self.universe.is_in_target(&seed_unit.identity_key()) {
                ", already in target"
            } else {
                ""
            }
        );
        self.admit(seed);

        while let Some(pending) = self.queue.pop_front() {
            if self.resolve_dependency(pending.requirer, &pending.dependency) {
                continue;
            }

            let entry = UnsatisfiedDependency {
                required_by: self.closure.units()[pending.requirer].nevra(),
                dependency: pending.dependency.to_string(),
            };
            match pending.strength {
                Strength::Required => {
                    warn!(
                        "Unsatisfiable requirement '{}' of {}",
                        entry.dependency, entry.required_by
                    );
                    self.closure.unsatisfiable.push(entry);
                }
                Strength::Weak => {
                    debug!(
                        "Skipping weak dependency '{}' of {}",
                        entry.dependency, entry.required_by
                    );
                    self.closure.skipped_weak.push(entry);
                }
            }
        }

        self.check_conflicts()?;
        self.note_obsoletes();
        self.note_supplements();

        info!(
            "Resolved {} units for '{}' ({} unsatisfiable)",
            self.closure.len(),
            requested,
            self.closure.unsatisfiable().len()
        );
        Ok(self.closure)
    }

    /// Add a universe unit to the closure, queueing its dependencies the
    /// first time it is seen
    fn admit(&mut self, id: UnitId) -> usize {
        let universe = self.universe;
        let unit = universe.unit(id);
        let (idx, inserted) = self.closure.admit(unit);

        if inserted {
            debug!("Adding {} to closure", unit);
            self.enqueue(idx, &unit.requires, Strength::Required);
            if !self.config.ignore_recommends {
                self.enqueue(idx, &unit.recommends, Strength::Weak);
            }
        }
        idx
    }

    fn enqueue(&mut self, requirer: usize, deps: &[Dependency], strength: Strength) {
        self.queue.extend(deps.iter().map(|dep| Pending {
            requirer,
            dependency: dep.clone(),
            strength,
        }));
    }

    /// Satisfy `dep` for the closure unit at `requirer`; false if impossible
    fn resolve_dependency(&mut self, requirer: usize, dep: &Dependency) -> bool {
        match dep {
            Dependency::Capability(cap) => {
                if let Some(idx) = self.closure_provider(cap) {
                    self.closure.add_edge(requirer, idx);
                    return true;
                }

                let candidates: Vec<UnitId> = self
                    .universe
                    .providers(cap)
                    .into_iter()
                    .filter(|&id| self.is_compatible(id))
                    .collect();

                match self.select_best(&candidates) {
                    Some(id) => {
                        let idx = self.admit(id);
                        self.closure.add_edge(requirer, idx);
                        true
                    }
                    None => false,
                }
            }
            Dependency::All(deps) | Dependency::With(deps) => deps
                .iter()
                .fold(true, |ok, d| self.resolve_dependency(requirer, d) && ok),
            Dependency::Without { dependency, .. } => self.resolve_dependency(requirer, dependency),
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                negated,
            } => {
                // The condition is judged against the closure as it stands now
                let holds = self.is_satisfied(condition);
                match active_branch(dependency, otherwise, *negated, holds) {
                    Some(d) => self.resolve_dependency(requirer, d),
                    None => true,
                }
            }
            Dependency::Any(deps) => {
                let chosen = deps
                    .iter()
                    .find(|d| self.is_satisfied(d))
                    .or_else(|| deps.iter().find(|d| self.is_resolvable(d)));
                match chosen {
                    Some(d) => self.resolve_dependency(requirer, d),
                    None => false,
                }
            }
        }
    }

    /// Earliest-discovered closure unit providing `cap`
    fn closure_provider(&self, cap: &Capability) -> Option<usize> {
        self.universe
            .providers(cap)
            .into_iter()
            .filter_map(|id| self.closure.index_of(&self.universe.unit(id).identity_key()))
            .min()
    }

    fn is_satisfied(&self, dep: &Dependency) -> bool {
        match dep {
            Dependency::Capability(cap) => self.closure_provider(cap).is_some(),
            Dependency::All(deps) | Dependency::With(deps) => {
                deps.iter().all(|d| self.is_satisfied(d))
            }
            Dependency::Any(deps) => deps.iter().any(|d| self.is_satisfied(d)),
            Dependency::Without { dependency, .. } => self.is_satisfied(dependency),
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                negated,
            } => {
                let holds = self.is_satisfied(condition);
                active_branch(dependency, otherwise, *negated, holds)
                    .is_none_or(|d| self.is_satisfied(d))
            }
        }
    }

    fn is_resolvable(&self, dep: &Dependency) -> bool {
        match dep {
            Dependency::Capability(cap) => self
                .universe
                .providers(cap)
                .into_iter()
                .any(|id| self.is_compatible(id)),
            Dependency::All(deps) | Dependency::With(deps) => {
                deps.iter().all(|d| self.is_resolvable(d))
            }
            Dependency::Any(deps) => deps.iter().any(|d| self.is_resolvable(d)),
            Dependency::Without { dependency, .. } => self.is_resolvable(dependency),
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                negated,
            } => {
                let holds = self.is_satisfied(condition);
                active_branch(dependency, otherwise, *negated, holds)
                    .is_none_or(|d| self.is_resolvable(d))
            }
        }
    }

    fn is_compatible(&self, id: UnitId) -> bool {
        self.config.is_arch_compatible(&self.universe.unit(id).arch)
    }

    fn select_best(&self, candidates: &[UnitId]) -> Option<UnitId> {
        candidates
            .iter()
            .copied()
            .min_by(|&a, &b| self.preference(a, b))
    }

    /// `Less` when `a` is the better candidate
    fn preference(&self, a: UnitId, b: UnitId) -> Ordering {
        let ua = self.universe.unit(a);
        let ub = self.universe.unit(b);
        let in_target = |u: &Unit| self.universe.is_in_target(&u.identity_key());
        let arch_rank = |u: &Unit| self.config.arch_rank(&u.arch).unwrap_or(usize::MAX);
        let is_source = |u: &Unit| u.kind == UnitKind::Srpm;

        in_target(ub)
            .cmp(&in_target(ua))
            .then_with(|| ub.evr.compare(&ua.evr))
            .then_with(|| arch_rank(ua).cmp(&arch_rank(ub)))
            .then_with(|| is_source(ua).cmp(&is_source(ub)))
            .then_with(|| ua.identity_key().cmp(&ub.identity_key()))
            .then_with(|| (ub.origin == Origin::Target).cmp(&(ua.origin == Origin::Target)))
            .then_with(|| a.cmp(&b))
    }

    /// Fail if any two closure units conflict
    ///
    /// The pair is reported in discovery order.
    fn check_conflicts(&self) -> Result<()> {
        let units = self.closure.units();
        for (i, unit) in units.iter().enumerate() {
            for conflict in &unit.conflicts {
                let hit = units
                    .iter()
                    .enumerate()
                    .find(|(j, other)| *j != i && other.is_hit_by(conflict));
                if let Some((j, other)) = hit {
                    warn!("{} conflicts with {} ('{}')", unit, other, conflict);
                    let (first, second) = if i < j { (unit, other) } else { (other, unit) };
                    return Err(Error::ConflictingUnits(first.nevra(), second.nevra()));
                }
            }
        }
        Ok(())
    }

    /// Record closure units obsoleted by other candidates
    ///
    /// Purely informational: the obsoleting unit is never substituted.
    fn note_obsoletes(&mut self) {
        let mut seen = HashSet::new();
        let mut notes = Vec::new();

        for unit in self.closure.units() {
            for id in self.universe.obsoleters_of(unit) {
                let obsoleter = self.universe.unit(id);
                if obsoleter.identity_key() == unit.identity_key() {
                    continue;
                }
                if obsoleter.name == unit.name
                    && obsoleter.evr.compare(&unit.evr) != Ordering::Greater
                {
                    continue;
                }
                if seen.insert((unit.nevra(), obsoleter.nevra())) {
                    info!("{} is obsoleted by {}", unit, obsoleter);
                    notes.push(ObsoleteNote {
                        unit: unit.nevra(),
                        obsoleted_by: obsoleter.nevra(),
                    });
                }
            }
        }

        self.closure.obsoleted = notes;
    }

    /// Record units outside the closure whose `supplements` the closure
    /// satisfies; they are never admitted
    fn note_supplements(&mut self) {
        let mut found = Vec::new();

        for unit in self.universe.units() {
            let key = unit.identity_key();
            if self.closure.contains(&key) || !self.config.is_arch_compatible(&unit.arch) {
                continue;
            }
            for dep in &unit.supplements {
                let touches_closure = dep
                    .capabilities()
                    .into_iter()
                    .any(|cap| self.closure_provider(cap).is_some());
                if touches_closure && self.is_satisfied(dep) {
                    found.push((key.clone(), unit.nevra(), dep.to_string()));
                }
            }
        }

        found.sort();
        found.dedup();
        self.closure.supplemented = found
            .into_iter()
            .map(|(_, unit, supplements)| {
                info!("{} supplements {}", unit, supplements);
                SupplementNote { unit, supplements }
            })
            .collect();
    }
}

/// Branch of a conditional dependency that applies, if any
fn active_branch<'d>(
    then: &'d Dependency,
    otherwise: &'d Option<Box<Dependency>>,
    negated: bool,
    holds: bool,
) -> Option<&'d Dependency> {
    if holds != negated {
        Some(then)
    } else {
        otherwise.as_deref()
    }
}
