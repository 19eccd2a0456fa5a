// src/config.rs

//! Resolver configuration
//!
//! Settings can come from a TOML file with a `[resolver]` table; command
//! line flags are applied on top by the binary.
//!
//! ```toml
//! [resolver]
//! preferred_arches = ["aarch64", "noarch"]
//! ignore_recommends = true
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Architecture that is compatible with every preference list
pub const NOARCH: &str = "noarch";

/// Policy knobs for a single resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Acceptable architectures, most preferred first. Empty accepts all.
    pub preferred_arches: Vec<String>,

    /// Do not follow weak (Recommends) dependencies
    pub ignore_recommends: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            preferred_arches: vec!["x86_64".to_string(), NOARCH.to_string()],
            ignore_recommends: false,
        }
    }
}

impl ResolverConfig {
    /// Preference rank of `arch` (lower is better), or `None` when the
    /// architecture is not acceptable at all
    ///
    /// `noarch` is always acceptable; unless listed explicitly it ranks
    /// after every listed architecture.
    pub fn arch_rank(&self, arch: &str) -> Option<usize> {
        if self.preferred_arches.is_empty() {
            return Some(0);
        }
        if let Some(pos) = self.preferred_arches.iter().position(|a| a == arch) {
            return Some(pos);
        }
        (arch == NOARCH).then_some(self.preferred_arches.len())
    }

    pub fn is_arch_compatible(&self, arch: &str) -> bool {
        self.arch_rank(arch).is_some()
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub resolver: ResolverConfig,
}

impl ConfigFile {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_arches() {
        let config = ResolverConfig::default();
        assert_eq!(config.arch_rank("x86_64"), Some(0));
        assert_eq!(config.arch_rank("noarch"), Some(1));
        assert_eq!(config.arch_rank("aarch64"), None);
    }

    #[test]
    fn test_empty_list_accepts_everything() {
        let config = ResolverConfig {
            preferred_arches: Vec::new(),
            ..Default::default()
        };
        assert!(config.is_arch_compatible("s390x"));
        assert!(config.is_arch_compatible("src"));
    }

    #[test]
    fn test_noarch_always_compatible() {
        let config = ResolverConfig {
            preferred_arches: vec!["aarch64".to_string()],
            ..Default::default()
        };
        assert_eq!(config.arch_rank("noarch"), Some(1));
    }

    #[test]
    fn test_parse_config_file() {
        let file = ConfigFile::from_toml_str(
            r#"
            [resolver]
            preferred_arches = ["aarch64", "noarch"]
            ignore_recommends = true
            "#,
        )
        .unwrap();
        assert_eq!(file.resolver.preferred_arches, vec!["aarch64", "noarch"]);
        assert!(file.resolver.ignore_recommends);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let file = ConfigFile::from_toml_str("[resolver]\nignore_recommends = true\n").unwrap();
        assert_eq!(file.resolver.preferred_arches, vec!["x86_64", "noarch"]);

        let empty = ConfigFile::from_toml_str("").unwrap();
        assert_eq!(empty, ConfigFile::default());
    }

    #[test]
    fn test_invalid_config_file() {
        assert!(ConfigFile::from_toml_str("[resolver]\nignore_recommends = \"yes\"\n").is_err());
    }
}
