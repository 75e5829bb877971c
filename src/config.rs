//! Run configuration.

use crate::mediation::MediationStrategy;
use crate::repository::{DEFAULT_CACHE_CAPACITY, DEFAULT_SYSTEM_PACKAGES};
use crate::types::CoordinateKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Exception types whose handlers mark code as guarding against missing classes.
pub const DEFAULT_DEFENSIVE_CATCH_TYPES: &[&str] =
    &["java.lang.NoClassDefFoundError", "java.lang.LinkageError"];

/// Settings for one linkage check run. Every field has a default, so a config file only
/// needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Parsed classes kept per analysis; 0 disables caching.
    pub class_cache_capacity: usize,
    /// Report only problems whose source class is reachable from the entry points.
    pub report_only_reachable: bool,
    pub mediation: MediationStrategy,
    /// `groupId:artifactId` to pinned version, applied by Gradle mediation.
    pub enforced_platform: BTreeMap<String, String>,
    /// Package prefixes treated as JDK-provided.
    pub system_packages: Vec<String>,
    /// Archives or directories holding JDK classes. Empty leaves JDK classes opaque.
    pub bootstrap_classpath: Vec<PathBuf>,
    pub defensive_catch_types: Vec<String>,
    /// Local Maven-layout repository roots.
    pub repositories: Vec<PathBuf>,
    pub exclusion_file: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            class_cache_capacity: DEFAULT_CACHE_CAPACITY,
            report_only_reachable: false,
            mediation: MediationStrategy::Maven,
            enforced_platform: BTreeMap::new(),
            system_packages: DEFAULT_SYSTEM_PACKAGES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            bootstrap_classpath: Vec::new(),
            defensive_catch_types: DEFAULT_DEFENSIVE_CATCH_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            repositories: default_repositories(),
            exclusion_file: None,
        }
    }
}

impl CheckerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: CheckerConfig = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// The enforced platform keyed by parsed coordinate keys.
    pub fn enforced_platform_keys(&self) -> Result<BTreeMap<CoordinateKey, String>> {
        self.enforced_platform
            .iter()
            .map(|(key, version)| {
                let key: CoordinateKey = key
                    .parse()
                    .with_context(|| format!("Invalid enforced platform key `{}`", key))?;
                Ok((key, version.clone()))
            })
            .collect()
    }
}

fn default_repositories() -> Vec<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".m2/repository"))
        .into_iter()
        .collect()
}
