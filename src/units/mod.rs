// src/units/mod.rs

//! Content units and their normalized representation
//!
//! Raw descriptors (`RawUnit`) come from a metadata source; the normalizer
//! turns them into immutable `Unit` values the resolver works on.

pub mod capability;
pub mod normalize;

pub use capability::{Capability, Dependency, Operator};
pub use normalize::{normalize, normalize_unit, NormalizeWarning, Normalized};

use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which repository a unit was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Source,
    Target,
}

/// Closed set of supported content unit types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Binary RPM package
    #[default]
    Rpm,
    /// Source RPM package
    Srpm,
    /// Advisory referencing a set of packages
    Erratum,
}

/// Reference to a package by name and EVR, as listed by an erratum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    #[serde(default)]
    pub epoch: Option<String>,
    pub version: String,
    #[serde(default)]
    pub release: Option<String>,
}

/// Unit descriptor as delivered by a metadata source
///
/// Dependency fields are raw strings (`name`, `name OP evr` or a rich
/// dependency); parsing happens in the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUnit {
    #[serde(default)]
    pub kind: UnitKind,
    pub name: String,
    #[serde(default)]
    pub epoch: Option<String>,
    pub version: String,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub recommends: Vec<String>,
    #[serde(default)]
    pub suggests: Vec<String>,
    #[serde(default)]
    pub supplements: Vec<String>,
    #[serde(default)]
    pub enhances: Vec<String>,
    #[serde(default)]
    pub obsoletes: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Packages referenced by an erratum
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    /// Path of the package file relative to the repository root
    #[serde(default)]
    pub location: Option<String>,
    /// SHA-256 of the package file, hex encoded
    #[serde(default)]
    pub checksum: Option<String>,
}

impl RawUnit {
    /// Create a minimal RPM descriptor
    pub fn rpm(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// (name, epoch, version, release, arch): uniquely identifies a unit instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
    pub arch: String,
}

impl IdentityKey {
    pub fn evr(&self) -> Evr {
        Evr::new(self.epoch, self.version.clone(), self.release.clone())
    }
}

impl Ord for IdentityKey {
    /// Name, then EVR ascending, then arch. Versions that compare equal but
    /// are spelled differently fall back to a plain string comparison so the
    /// ordering stays consistent with `Eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.evr().compare(&other.evr()))
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.release.cmp(&other.release))
            .then_with(|| self.arch.cmp(&other.arch))
    }
}

impl PartialOrd for IdentityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr(), self.arch)
    }
}

/// One normalized package instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub name: String,
    pub evr: Evr,
    pub arch: String,
    pub kind: UnitKind,
    pub origin: Origin,
    pub provides: Vec<Capability>,
    pub requires: Vec<Dependency>,
    pub recommends: Vec<Dependency>,
    /// Weak dependencies that are recorded but never followed
    pub suggests: Vec<Dependency>,
    pub supplements: Vec<Dependency>,
    pub enhances: Vec<Dependency>,
    pub obsoletes: Vec<Capability>,
    pub conflicts: Vec<Capability>,
    pub location: Option<String>,
    pub checksum: Option<String>,
}

impl Unit {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.clone(),
            epoch: self.evr.epoch,
            version: self.evr.version.clone(),
            release: self.evr.release.clone(),
            arch: self.arch.clone(),
        }
    }

    /// Return the same unit tagged with `origin`
    pub fn with_origin(self, origin: Origin) -> Self {
        Self { origin, ..self }
    }

    /// `name = evr`, the capability every unit implicitly carries
    pub fn self_provide(&self) -> Capability {
        Capability::versioned(self.name.clone(), Operator::Equal, self.evr.clone())
    }

    /// Provides used for requirement matching
    ///
    /// A unit without explicit provides is treated as providing itself.
    /// Source packages provide nothing.
    pub fn effective_provides(&self) -> Vec<Capability> {
        match self.kind {
            UnitKind::Srpm => Vec::new(),
            _ if self.provides.is_empty() => vec![self.self_provide()],
            _ => self.provides.clone(),
        }
    }

    /// Does any effective provide satisfy `required`?
    pub fn provides_capability(&self, required: &Capability) -> bool {
        match self.kind {
            UnitKind::Srpm => false,
            _ if self.provides.is_empty() => self.self_provide().satisfies(required),
            _ => self.provides.iter().any(|p| p.satisfies(required)),
        }
    }

    /// Does `conflict` (declared by some other unit) hit this unit?
    ///
    /// Conflicts match provides as well as the unit's own name and EVR.
    pub fn is_hit_by(&self, conflict: &Capability) -> bool {
        self.provides_capability(conflict) || self.self_provide().satisfies(conflict)
    }

    /// Does this unit declare an obsolete matching `other` by name and EVR?
    pub fn obsoletes_unit(&self, other: &Unit) -> bool {
        let target = other.self_provide();
        self.obsoletes.iter().any(|o| target.satisfies(o))
    }

    /// name-[epoch:]version-release.arch
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra())
    }
}
