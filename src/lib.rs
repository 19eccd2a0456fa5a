// src/lib.rs

//! copysolv: dependency-aware copying between RPM repositories
//!
//! Copying a unit from a source repository to a target repository is only
//! safe when everything it needs is copied along with it. This crate
//! computes that set and orders it dependencies first.
//!
//! # Architecture
//!
//! - `units`: raw descriptors, capability parsing and the metadata normalizer
//! - `resolver`: universe building, closure resolution and diff reduction
//! - `repository`: metadata sources (rpm-md, JSON) and copy sinks
//! - `version`: RPM EVR comparison
//! - `config`: resolver policy and its TOML form

pub mod config;
mod error;
pub mod repository;
pub mod resolver;
pub mod units;
pub mod version;

pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use resolver::{plan_copy, CopyPlan, ResolutionReport};
