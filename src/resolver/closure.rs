// src/resolver/closure.rs

//! Resolution closure and dependency ordering
//!
//! The closure is the set of units a requested unit transitively needs,
//! keyed by identity, together with the "requires" edges between them and
//! everything that could not be satisfied.

use crate::units::{IdentityKey, Unit};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// A requirement nothing in the universe could satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsatisfiedDependency {
    /// NEVRA of the unit declaring the requirement
    pub required_by: String,
    pub dependency: String,
}

/// Informational: a closure unit is obsoleted by another candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObsoleteNote {
    pub unit: String,
    pub obsoleted_by: String,
}

/// Informational: a unit outside the closure supplements closure units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplementNote {
    pub unit: String,
    pub supplements: String,
}

/// Units found necessary for a requested unit
#[derive(Debug, Clone)]
pub struct ResolutionClosure {
    requested: String,
    /// Discovery order; index 0 is the seed
    units: Vec<Unit>,
    index: HashMap<IdentityKey, usize>,
    /// `edges[i]`: closure indexes unit `i` depends on
    edges: Vec<Vec<usize>>,
    pub(crate) unsatisfiable: Vec<UnsatisfiedDependency>,
    pub(crate) skipped_weak: Vec<UnsatisfiedDependency>,
    pub(crate) obsoleted: Vec<ObsoleteNote>,
    pub(crate) supplemented: Vec<SupplementNote>,
}

impl ResolutionClosure {
    pub(crate) fn new(requested: &str) -> Self {
        Self {
            requested: requested.to_string(),
            units: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            unsatisfiable: Vec::new(),
            skipped_weak: Vec::new(),
            obsoleted: Vec::new(),
            supplemented: Vec::new(),
        }
    }

    /// Add `unit` unless a unit with the same identity is already present
    ///
    /// Returns the closure index and whether the unit was newly added.
    pub(crate) fn admit(&mut self, unit: &Unit) -> (usize, bool) {
        let key = unit.identity_key();
        if let Some(&idx) = self.index.get(&key) {
            return (idx, false);
        }
        let idx = self.units.len();
        self.units.push(unit.clone());
        self.edges.push(Vec::new());
        self.index.insert(key, idx);
        (idx, true)
    }

    /// Record that unit `from` requires something unit `to` provides
    pub(crate) fn add_edge(&mut self, from: usize, to: usize) {
        if from != to && !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// The unit selected for the requested name
    pub fn seed(&self) -> &Unit {
        &self.units[0]
    }

    /// Units in discovery order
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn index_of(&self, key: &IdentityKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Closure units satisfying the requirements of the unit at `idx`
    pub fn dependencies_of(&self, idx: usize) -> Vec<&Unit> {
        self.edges[idx].iter().map(|&d| &self.units[d]).collect()
    }

    pub fn unsatisfiable(&self) -> &[UnsatisfiedDependency] {
        &self.unsatisfiable
    }

    pub fn skipped_weak(&self) -> &[UnsatisfiedDependency] {
        &self.skipped_weak
    }

    pub fn obsoleted(&self) -> &[ObsoleteNote] {
        &self.obsoleted
    }

    pub fn supplemented(&self) -> &[SupplementNote] {
        &self.supplemented
    }

    /// Closure indexes ordered dependencies first
    ///
    /// Strongly connected components (dependency cycles) are collapsed and
    /// emitted as one group in identity-key order. Among groups with no
    /// ordering constraint between them, the smallest identity key goes
    /// first.
    pub fn dependency_order(&self) -> Vec<usize> {
        let keys: Vec<IdentityKey> = self.units.iter().map(Unit::identity_key).collect();

        let mut components = Tarjan::new(&self.edges).run();
        for members in &mut components {
            members.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        }

        let mut component_of = vec![0; self.units.len()];
        for (c, members) in components.iter().enumerate() {
            for &m in members {
                component_of[m] = c;
            }
        }

        // Distinct dependency components of each component
        let mut pending = vec![0usize; components.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
        for (c, members) in components.iter().enumerate() {
            let deps: BTreeSet<usize> = members
                .iter()
                .flat_map(|&m| self.edges[m].iter().map(|&d| component_of[d]))
                .filter(|&d| d != c)
                .collect();
            pending[c] = deps.len();
            for d in deps {
                dependents[d].push(c);
            }
        }

        let mut ready: BTreeSet<(&IdentityKey, usize)> = components
            .iter()
            .enumerate()
            .filter(|(c, _)| pending[*c] == 0)
            .map(|(c, members)| (&keys[members[0]], c))
            .collect();

        let mut order = Vec::with_capacity(self.units.len());
        while let Some((_, c)) = ready.pop_first() {
            order.extend_from_slice(&components[c]);
            for &dependent in &dependents[c] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert((&keys[components[dependent][0]], dependent));
                }
            }
        }

        order
    }
}

/// Tarjan's strongly connected components
struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(edges: &'a [Vec<usize>]) -> Self {
        let n = edges.len();
        Self {
            edges,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for v in 0..self.edges.len() {
            if self.index[v].is_none() {
                self.visit(v);
            }
        }
        self.components
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.lowlink[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let edges = self.edges;
        for &w in &edges[v] {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if self.index[v] == Some(self.lowlink[v]) {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
