// src/repository/mod.rs

//! Repository collaborators
//!
//! The resolver only consumes unit lists and produces a copy plan. This
//! module defines the two boundaries around it and ships implementations:
//! - `MetadataSource`: lists the raw units of a repository
//!   (`RepodataSource` for rpm-md repositories, `JsonSource` for JSON dumps)
//! - `CopySink`: performs the copy of a plan
//!   (`DirectoryCopySink` for local repositories, `DryRunSink`)

pub mod repodata;

pub use repodata::RepodataSource;

use crate::error::{Error, Result};
use crate::resolver::CopyPlan;
use crate::units::{RawUnit, Unit};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Lists the units contained in a repository
pub trait MetadataSource {
    fn list_units(&self, repository: &str) -> Result<Vec<RawUnit>>;
}

/// Copies the units of a plan from one repository to another
pub trait CopySink {
    /// Copy every unit of `plan`; one outcome per unit, in plan order
    fn copy_units(&self, plan: &CopyPlan, source: &str, target: &str) -> Vec<CopyOutcome>;
}

/// Result of copying one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum CopyStatus {
    Copied,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    pub unit: String,
    #[serde(flatten)]
    pub status: CopyStatus,
}

/// Reads a JSON array of unit descriptors from a file
///
/// The repository identifier is the path of the JSON file.
#[derive(Debug, Default)]
pub struct JsonSource;

impl MetadataSource for JsonSource {
    fn list_units(&self, repository: &str) -> Result<Vec<RawUnit>> {
        debug!("Reading units from {}", repository);
        let content = fs::read_to_string(repository)?;
        let units: Vec<RawUnit> = serde_json::from_str(&content)?;
        info!("Loaded {} units from {}", units.len(), repository);
        Ok(units)
    }
}

/// Reports every unit as skipped without touching anything
#[derive(Debug, Default)]
pub struct DryRunSink;

impl CopySink for DryRunSink {
    fn copy_units(&self, plan: &CopyPlan, source: &str, target: &str) -> Vec<CopyOutcome> {
        plan.iter()
            .map(|unit| {
                info!("Would copy {} from {} to {}", unit, source, target);
                CopyOutcome {
                    unit: unit.nevra(),
                    status: CopyStatus::Skipped,
                }
            })
            .collect()
    }
}

/// Copies package files between two local repository directories
///
/// Each unit's `location` is copied from the source root to the same
/// relative path under the target root, then checked against the unit's
/// SHA-256 when one is known. Target repodata is not regenerated.
#[derive(Debug, Default)]
pub struct DirectoryCopySink;

impl DirectoryCopySink {
    fn copy_one(&self, unit: &Unit, source: &Path, target: &Path) -> Result<()> {
        let location = unit
            .location
            .as_deref()
            .ok_or_else(|| Error::CopyError(format!("{} has no package location", unit)))?;

        let src = source.join(location);
        let dest = target.join(location);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temporary file first, then rename into place
        let temp_path = dest.with_extension("tmp");
        fs::copy(&src, &temp_path)?;

        if let Some(expected) = unit.checksum.as_deref() {
            if let Err(e) = verify_checksum(&temp_path, expected) {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        }

        fs::rename(&temp_path, &dest)?;
        debug!("Copied {} to {}", src.display(), dest.display());
        Ok(())
    }
}

impl CopySink for DirectoryCopySink {
    fn copy_units(&self, plan: &CopyPlan, source: &str, target: &str) -> Vec<CopyOutcome> {
        let source = Path::new(source);
        let target = Path::new(target);

        plan.iter()
            .map(|unit| {
                let status = match self.copy_one(unit, source, target) {
                    Ok(()) => {
                        info!("Copied {}", unit);
                        CopyStatus::Copied
                    }
                    Err(e) => {
                        warn!("Failed to copy {}: {}", unit, e);
                        CopyStatus::Failed(e.to_string())
                    }
                };
                CopyOutcome {
                    unit: unit.nevra(),
                    status,
                }
            })
            .collect()
    }
}

/// Verify file checksum matches expected value
fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    let actual = format!("{:x}", hasher.finalize());
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}
