// src/main.rs

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use copysolv::config::ConfigFile;
use copysolv::repository::{
    CopyOutcome, CopySink, CopyStatus, DirectoryCopySink, JsonSource, MetadataSource,
    RepodataSource,
};
use copysolv::{plan_copy, ResolutionReport, ResolverConfig};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Repository metadata formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceFormat {
    /// rpm-md repository (directory or http(s) URL containing repodata/)
    Repodata,
    /// JSON file holding an array of unit descriptors
    Json,
}

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "copysolv")]
#[command(author, version, about = "Dependency-aware unit copying between RPM repositories", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the units needed to copy a unit from source to target
    Resolve {
        /// Name of the unit to copy
        unit: String,
        /// Source repository
        #[arg(short, long)]
        source: String,
        /// Target repository
        #[arg(short, long)]
        target: String,
        /// Metadata format of both repositories
        #[arg(short, long, value_enum, default_value = "repodata")]
        format: SourceFormat,
        /// Acceptable architecture, most preferred first (repeatable)
        #[arg(short, long = "arch")]
        arch: Vec<String>,
        /// Do not follow weak (Recommends) dependencies
        #[arg(long)]
        ignore_recommends: bool,
        /// TOML configuration file with a [resolver] table
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
        /// Copy the planned units (local directories only)
        #[arg(long)]
        copy: bool,
        /// Fail when any hard requirement is unsatisfiable
        #[arg(long)]
        strict: bool,
    },
}

/// Build the resolver configuration: file values first, flags on top
fn resolver_config(
    config: Option<&PathBuf>,
    arches: &[String],
    ignore_recommends: bool,
) -> Result<ResolverConfig> {
    let mut resolver = match config {
        Some(path) => ConfigFile::load(path)?.resolver,
        None => ResolverConfig::default(),
    };

    if !arches.is_empty() {
        resolver.preferred_arches = arches.to_vec();
    }
    if ignore_recommends {
        resolver.ignore_recommends = true;
    }

    Ok(resolver)
}

fn metadata_source(format: SourceFormat) -> Result<Box<dyn MetadataSource>> {
    Ok(match format {
        SourceFormat::Repodata => Box::new(RepodataSource::new()?),
        SourceFormat::Json => Box::new(JsonSource),
    })
}

/// Shape of `--output json`
#[derive(Serialize)]
struct JsonOutput<'a> {
    report: &'a ResolutionReport,
    copied: Option<&'a [CopyOutcome]>,
}

fn is_remote(repository: &str) -> bool {
    repository.contains("://")
}

/// Human-readable rendering of a report and optional copy outcomes
fn render_text(
    out: &mut impl fmt::Write,
    report: &ResolutionReport,
    outcomes: Option<&[CopyOutcome]>,
) -> fmt::Result {
    writeln!(
        out,
        "Requested: {} (selected {})",
        report.requested, report.selected
    )?;
    writeln!(
        out,
        "Closure: {} units, {} to copy",
        report.closure_size,
        report.plan.len()
    )?;

    if report.plan.is_empty() {
        writeln!(out, "Nothing to copy: target already satisfies {}", report.requested)?;
    } else {
        writeln!(out, "\nCopy plan (dependencies first):")?;
        for (i, unit) in report.plan.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, unit.nevra())?;
        }
    }

    if !report.unsatisfiable.is_empty() {
        writeln!(out, "\nUnsatisfied requirements:")?;
        for dep in &report.unsatisfiable {
            writeln!(out, "  {} requires {}", dep.required_by, dep.dependency)?;
        }
    }

    if !report.skipped_weak.is_empty() {
        writeln!(out, "\nSkipped weak dependencies:")?;
        for dep in &report.skipped_weak {
            writeln!(out, "  {} recommends {}", dep.required_by, dep.dependency)?;
        }
    }

    if !report.obsoleted.is_empty() {
        writeln!(out, "\nObsoleted units:")?;
        for note in &report.obsoleted {
            writeln!(out, "  {} is obsoleted by {}", note.unit, note.obsoleted_by)?;
        }
    }

    if !report.supplemented.is_empty() {
        writeln!(out, "\nSupplementing units (not copied):")?;
        for note in &report.supplemented {
            writeln!(out, "  {} supplements {}", note.unit, note.supplements)?;
        }
    }

    if !report.warnings.is_empty() {
        writeln!(out, "\nDropped units:")?;
        for warning in &report.warnings {
            writeln!(out, "  {}: {}", warning.unit, warning.reason)?;
        }
    }

    if let Some(outcomes) = outcomes {
        writeln!(out, "\nCopy results:")?;
        for outcome in outcomes {
            match &outcome.status {
                CopyStatus::Copied => writeln!(out, "  {} copied", outcome.unit)?,
                CopyStatus::Skipped => writeln!(out, "  {} skipped", outcome.unit)?,
                CopyStatus::Failed(reason) => {
                    writeln!(out, "  {} FAILED ({})", outcome.unit, reason)?
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            unit,
            source,
            target,
            format,
            arch,
            ignore_recommends,
            config,
            output,
            copy,
            strict,
        } => {
            let resolver = resolver_config(config.as_ref(), &arch, ignore_recommends)?;
            info!("Resolving '{}' from {} into {}", unit, source, target);

            let metadata = metadata_source(format)?;
            let source_units = metadata.list_units(&source)?;
            let target_units = metadata.list_units(&target)?;

            let report = plan_copy(source_units, target_units, &unit, &resolver)?;

            let outcomes = if copy {
                if is_remote(&source) || is_remote(&target) {
                    return Err(anyhow!("--copy requires local repository directories"));
                }
                Some(DirectoryCopySink.copy_units(&report.plan, &source, &target))
            } else {
                None
            };

            match output {
                OutputFormat::Text => {
                    let mut text = String::new();
                    render_text(&mut text, &report, outcomes.as_deref())?;
                    print!("{}", text);
                }
                OutputFormat::Json => {
                    let value = JsonOutput {
                        report: &report,
                        copied: outcomes.as_deref(),
                    };
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
            }

            if let Some(outcomes) = &outcomes {
                let failed = outcomes
                    .iter()
                    .filter(|o| matches!(o.status, CopyStatus::Failed(_)))
                    .count();
                if failed > 0 {
                    return Err(anyhow!("{} of {} units failed to copy", failed, outcomes.len()));
                }
            }

            if !report.is_complete() {
                if strict {
                    return Err(anyhow!(
                        "{} unsatisfiable requirement(s) in the closure of '{}'",
                        report.unsatisfiable.len(),
                        unit
                    ));
                }
                warn!(
                    "{} requirement(s) could not be satisfied",
                    report.unsatisfiable.len()
                );
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copysolv::units::RawUnit;

    fn report() -> ResolutionReport {
        let source = vec![
            RawUnit {
                requires: vec!["zoo-lib >= 2.0".to_string(), "fish".to_string()],
                ..RawUnit::rpm("penguin", "1.0")
            },
            RawUnit::rpm("zoo-lib", "2.1"),
        ];
        plan_copy(source, Vec::new(), "penguin", &ResolverConfig::default()).unwrap()
    }

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "copysolv", "resolve", "penguin", "--source", "/src", "--target", "/dst", "--arch",
            "aarch64", "--arch", "noarch", "--format", "json", "--strict",
        ])
        .unwrap();

        let Commands::Resolve {
            unit,
            arch,
            format,
            output,
            strict,
            copy,
            ..
        } = cli.command;
        assert_eq!(unit, "penguin");
        assert_eq!(arch, vec!["aarch64", "noarch"]);
        assert_eq!(format, SourceFormat::Json);
        assert_eq!(output, OutputFormat::Text);
        assert!(strict);
        assert!(!copy);
    }

    #[test]
    fn test_cli_requires_repositories() {
        assert!(Cli::try_parse_from(["copysolv", "resolve", "penguin"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copysolv.toml");
        std::fs::write(
            &path,
            "[resolver]\npreferred_arches = [\"ppc64le\"]\nignore_recommends = false\n",
        )
        .unwrap();

        let from_file = resolver_config(Some(&path), &[], false).unwrap();
        assert_eq!(from_file.preferred_arches, vec!["ppc64le"]);

        let overridden =
            resolver_config(Some(&path), &["aarch64".to_string()], true).unwrap();
        assert_eq!(overridden.preferred_arches, vec!["aarch64"]);
        assert!(overridden.ignore_recommends);
    }

    fn render(report: &ResolutionReport, outcomes: Option<&[CopyOutcome]>) -> String {
        let mut text = String::new();
        render_text(&mut text, report, outcomes).unwrap();
        text
    }

    #[test]
    fn test_render_text() {
        let text = render(&report(), None);
        assert!(text.contains("Requested: penguin (selected penguin-1.0.noarch)"));
        assert!(text.contains("  1. zoo-lib-2.1.noarch\n  2. penguin-1.0.noarch"));
        assert!(text.contains("penguin-1.0.noarch requires fish"));
        assert!(!text.contains("Copy results"));
    }

    #[test]
    fn test_render_text_with_outcomes() {
        let outcomes = vec![CopyOutcome {
            unit: "zoo-lib-2.1.noarch".to_string(),
            status: CopyStatus::Failed("missing".to_string()),
        }];
        let text = render(&report(), Some(&outcomes));
        assert!(text.contains("zoo-lib-2.1.noarch FAILED (missing)"));
    }

    #[test]
    fn test_render_text_lists_supplements() {
        let source = vec![
            RawUnit::rpm("penguin", "1.0"),
            RawUnit {
                supplements: vec!["penguin".to_string()],
                ..RawUnit::rpm("penguin-langpack", "1.0")
            },
        ];
        let report =
            plan_copy(source, Vec::new(), "penguin", &ResolverConfig::default()).unwrap();
        let text = render(&report, None);
        assert!(text.contains("Supplementing units (not copied):"));
        assert!(text.contains("  penguin-langpack-1.0.noarch supplements penguin"));
    }

    #[test]
    fn test_render_text_propagates_writer_errors() {
        struct Refuse;
        impl fmt::Write for Refuse {
            fn write_str(&mut self, _: &str) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        assert!(render_text(&mut Refuse, &report(), None).is_err());
    }

    #[test]
    fn test_json_output_shape() {
        let report = report();
        let value = serde_json::to_value(JsonOutput {
            report: &report,
            copied: None,
        })
        .unwrap();
        assert_eq!(value["report"]["plan"][0]["name"], "zoo-lib");
        assert_eq!(value["report"]["unsatisfiable"][0]["dependency"], "fish");
        assert!(value["copied"].is_null());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://mirror.example.com/fedora"));
        assert!(!is_remote("/srv/repos/fedora"));
    }
}
