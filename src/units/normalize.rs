// src/units/normalize.rs

//! Metadata normalizer
//!
//! Converts raw unit descriptors into `Unit` values. A unit with a
//! malformed dependency string is dropped with a warning instead of
//! failing the whole repository.

use super::capability::{Capability, Dependency, Operator};
use super::{Origin, RawUnit, Unit, UnitKind};
use crate::error::{Error, Result};
use crate::version::{parse_epoch, Evr};
use serde::Serialize;
use tracing::{debug, warn};

/// Architecture assumed when a descriptor carries none
pub const DEFAULT_ARCH: &str = "noarch";

/// Architecture recorded for source packages
pub const SOURCE_ARCH: &str = "src";

/// Prefix given to erratum names so they never collide with package names
pub const ERRATUM_PREFIX: &str = "errata:";

/// A unit the normalizer had to drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeWarning {
    pub unit: String,
    pub reason: String,
}

/// Output of a normalization pass
#[derive(Debug, Default)]
pub struct Normalized {
    pub units: Vec<Unit>,
    pub warnings: Vec<NormalizeWarning>,
}

/// Normalize a batch of descriptors, isolating failures per unit
pub fn normalize<I>(raw_units: I) -> Normalized
where
    I: IntoIterator<Item = RawUnit>,
{
    let mut out = Normalized::default();

    for raw in raw_units {
        match normalize_unit(&raw) {
            Ok(unit) => out.units.push(unit),
            Err(e) => {
                warn!("Skipping unit {}-{}: {}", raw.name, raw.version, e);
                out.warnings.push(NormalizeWarning {
                    unit: format!("{}-{}", raw.name, raw.version),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Normalized {} units ({} skipped)",
        out.units.len(),
        out.warnings.len()
    );
    out
}

/// Normalize one descriptor
///
/// The result is tagged `Origin::Source`; the universe builder retags it.
pub fn normalize_unit(raw: &RawUnit) -> Result<Unit> {
    if raw.name.trim().is_empty() {
        return Err(Error::malformed(&raw.name, "unit has no name"));
    }

    let evr = parse_unit_evr(raw.epoch.as_deref(), &raw.version, raw.release.as_deref())?;

    match raw.kind {
        UnitKind::Rpm => Ok(Unit {
            name: raw.name.clone(),
            evr,
            arch: arch_or_default(raw.arch.as_deref()),
            kind: UnitKind::Rpm,
            origin: Origin::Source,
            provides: parse_capabilities(&raw.provides)?,
            requires: parse_dependencies(&raw.requires)?,
            recommends: parse_dependencies(&raw.recommends)?,
            suggests: parse_dependencies(&raw.suggests)?,
            supplements: parse_dependencies(&raw.supplements)?,
            enhances: parse_dependencies(&raw.enhances)?,
            obsoletes: parse_capabilities(&raw.obsoletes)?,
            conflicts: parse_capabilities(&raw.conflicts)?,
            location: raw.location.clone(),
            checksum: raw.checksum.clone(),
        }),
        UnitKind::Srpm => Ok(Unit {
            name: raw.name.clone(),
            evr,
            arch: SOURCE_ARCH.to_string(),
            kind: UnitKind::Srpm,
            origin: Origin::Source,
            provides: Vec::new(),
            requires: parse_dependencies(&raw.requires)?,
            recommends: Vec::new(),
            suggests: Vec::new(),
            supplements: Vec::new(),
            enhances: Vec::new(),
            obsoletes: Vec::new(),
            conflicts: parse_capabilities(&raw.conflicts)?,
            location: raw.location.clone(),
            checksum: raw.checksum.clone(),
        }),
        UnitKind::Erratum => {
            let name = if raw.name.starts_with(ERRATUM_PREFIX) {
                raw.name.clone()
            } else {
                format!("{}{}", ERRATUM_PREFIX, raw.name)
            };

            let mut requires = parse_dependencies(&raw.requires)?;
            for pkg in &raw.packages {
                let pkg_evr =
                    parse_unit_evr(pkg.epoch.as_deref(), &pkg.version, pkg.release.as_deref())?;
                requires.push(Dependency::Capability(Capability::versioned(
                    pkg.name.clone(),
                    Operator::Equal,
                    pkg_evr,
                )));
            }

            let provides = vec![Capability::versioned(
                name.clone(),
                Operator::Equal,
                evr.clone(),
            )];

            Ok(Unit {
                name,
                evr,
                arch: arch_or_default(raw.arch.as_deref()),
                kind: UnitKind::Erratum,
                origin: Origin::Source,
                provides,
                requires,
                recommends: Vec::new(),
                suggests: Vec::new(),
                supplements: Vec::new(),
                enhances: Vec::new(),
                obsoletes: Vec::new(),
                conflicts: Vec::new(),
                location: None,
                checksum: None,
            })
        }
    }
}

/// Build an EVR from separate fields, or from a combined version string
/// when neither epoch nor release is given separately
fn parse_unit_evr(epoch: Option<&str>, version: &str, release: Option<&str>) -> Result<Evr> {
    if epoch.is_none() && release.is_none() {
        return Evr::parse(version);
    }

    let epoch = parse_epoch(epoch.unwrap_or("")).map_err(|reason| Error::malformed(version, reason))?;
    let version = version.trim();
    if version.is_empty() {
        return Err(Error::malformed(version, "empty version"));
    }
    Ok(Evr::new(
        epoch,
        version,
        release.map(|r| r.trim().to_string()),
    ))
}

fn arch_or_default(arch: Option<&str>) -> String {
    match arch.map(str::trim) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => DEFAULT_ARCH.to_string(),
    }
}

/// rpmlib() requirements are satisfied by rpm itself, never by a unit
fn is_rpmlib(dep: &str) -> bool {
    dep.trim_start().starts_with("rpmlib(")
}

fn parse_capabilities(raw: &[String]) -> Result<Vec<Capability>> {
    raw.iter().map(|s| Capability::parse(s)).collect()
}

fn parse_dependencies(raw: &[String]) -> Result<Vec<Dependency>> {
    raw.iter()
        .filter(|s| !is_rpmlib(s))
        .map(|s| Dependency::parse(s))
        .collect()
}
