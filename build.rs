// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("copysolv")
        .version(env!("CARGO_PKG_VERSION"))
        .author("copysolv Contributors")
        .about("Dependency-aware unit copying between RPM repositories")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Compute the units needed to copy a unit from source to target")
                .arg(Arg::new("unit").required(true).help("Name of the unit to copy"))
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .required(true)
                        .value_name("REPO")
                        .help("Source repository"),
                )
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .required(true)
                        .value_name("REPO")
                        .help("Target repository"),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_parser(["repodata", "json"])
                        .default_value("repodata")
                        .help("Metadata format of both repositories"),
                )
                .arg(
                    Arg::new("arch")
                        .short('a')
                        .long("arch")
                        .action(ArgAction::Append)
                        .help("Acceptable architecture, most preferred first (repeatable)"),
                )
                .arg(
                    Arg::new("ignore_recommends")
                        .long("ignore-recommends")
                        .action(ArgAction::SetTrue)
                        .help("Do not follow weak (Recommends) dependencies"),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("TOML configuration file with a [resolver] table"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(["text", "json"])
                        .default_value("text")
                        .help("Report format"),
                )
                .arg(
                    Arg::new("copy")
                        .long("copy")
                        .action(ArgAction::SetTrue)
                        .help("Copy the planned units (local directories only)"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Fail when any hard requirement is unsatisfiable"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("copysolv.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
