// src/resolver/plan.rs

//! Resolution report
//!
//! Bundles the copy plan with everything the caller should know before
//! acting on it.

use super::closure::{ObsoleteNote, SupplementNote, UnsatisfiedDependency};
use super::reduce::{reduce, CopyPlan};
use super::universe::Universe;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::units::{normalize, NormalizeWarning, RawUnit};
use serde::Serialize;
use tracing::info;

/// Outcome of one copy resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    /// Requested unit name
    pub requested: String,
    /// NEVRA of the unit selected for the request
    pub selected: String,
    /// Units to copy, dependencies first
    pub plan: CopyPlan,
    /// Number of units in the closure, including ones already in the target
    pub closure_size: usize,
    pub unsatisfiable: Vec<UnsatisfiedDependency>,
    pub skipped_weak: Vec<UnsatisfiedDependency>,
    pub obsoleted: Vec<ObsoleteNote>,
    /// Units outside the plan that supplement planned units
    pub supplemented: Vec<SupplementNote>,
    /// Units dropped during normalization
    pub warnings: Vec<NormalizeWarning>,
}

impl ResolutionReport {
    /// True when every hard requirement in the closure was satisfied
    pub fn is_complete(&self) -> bool {
        self.unsatisfiable.is_empty()
    }
}

/// Normalize both repositories, resolve `requested` and reduce the result
pub fn plan_copy(
    source: Vec<RawUnit>,
    target: Vec<RawUnit>,
    requested: &str,
    config: &ResolverConfig,
) -> Result<ResolutionReport> {
    let source = normalize(source);
    let target = normalize(target);

    let mut warnings = source.warnings;
    warnings.extend(target.warnings);

    let universe = Universe::build(source.units, target.units)?;
    let closure = super::resolve(&universe, requested, config)?;
    let plan = reduce(&closure, universe.target_identity_keys());

    info!(
        "Copying '{}' requires {} of {} units",
        requested,
        plan.len(),
        closure.len()
    );

    Ok(ResolutionReport {
        requested: requested.to_string(),
        selected: closure.seed().nevra(),
        plan,
        closure_size: closure.len(),
        unsatisfiable: closure.unsatisfiable().to_vec(),
        skipped_weak: closure.skipped_weak().to_vec(),
        obsoleted: closure.obsoleted().to_vec(),
        supplemented: closure.supplemented().to_vec(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn raw(name: &str, evr: &str, provides: &[&str], requires: &[&str]) -> RawUnit {
        RawUnit {
            provides: provides.iter().map(|s| s.to_string()).collect(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            ..RawUnit::rpm(name, evr)
        }
    }

    fn zoo() -> Vec<RawUnit> {
        vec![
            raw("penguin", "1.0", &[], &["zoo-lib>=2.0"]),
            raw("zoo-lib", "2.1", &["zoo-lib=2.1"], &[]),
        ]
    }

    #[test]
    fn test_penguin_into_empty_target() {
        let report = plan_copy(zoo(), Vec::new(), "penguin", &ResolverConfig::default()).unwrap();
        assert_eq!(
            report.plan.nevras(),
            vec!["zoo-lib-2.1.noarch", "penguin-1.0.noarch"]
        );
        assert!(report.is_complete());
        assert_eq!(report.selected, "penguin-1.0.noarch");
    }

    #[test]
    fn test_penguin_with_zoo_lib_in_target() {
        let target = vec![raw("zoo-lib", "2.1", &["zoo-lib=2.1"], &[])];
        let report = plan_copy(zoo(), target, "penguin", &ResolverConfig::default()).unwrap();
        assert_eq!(report.plan.nevras(), vec!["penguin-1.0.noarch"]);
        assert_eq!(report.closure_size, 2);
    }

    #[test]
    fn test_normalization_warnings_are_reported() {
        let mut source = zoo();
        source.push(raw("broken", "1.0", &[], &["foo >="]));
        let report = plan_copy(source, Vec::new(), "penguin", &ResolverConfig::default()).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.plan.len(), 2);
    }

    #[test]
    fn test_conditional_requirement_keeps_unit() {
        let source = vec![
            raw("penguin", "1.0", &[], &["(zoo-lib if walrus)"]),
            raw("zoo-lib", "2.1", &[], &[]),
        ];
        let report = plan_copy(source, Vec::new(), "penguin", &ResolverConfig::default()).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.selected, "penguin-1.0.noarch");
        assert_eq!(report.plan.nevras(), vec!["penguin-1.0.noarch"]);
        assert!(report.is_complete());
    }

    #[test]
    fn test_empty_repositories() {
        let err = plan_copy(Vec::new(), Vec::new(), "penguin", &ResolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyUniverse));
    }

    #[test]
    fn test_report_serializes() {
        let report = plan_copy(zoo(), Vec::new(), "penguin", &ResolverConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["requested"], "penguin");
        assert_eq!(json["plan"][0]["name"], "zoo-lib");
        assert_eq!(json["plan"][1]["origin"], "source");
        assert_eq!(json["supplemented"], serde_json::json!([]));
    }
}
