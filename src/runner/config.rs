//! Runtime configuration file parsing.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::runner::ds::error::ClassError;

/// How parent names given to `inherits` are looked up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Try `child_namespace.Name` before the bare `Name` for unqualified parent names.
    pub relative_parents: bool,
    /// Fall back to the global symbol table when the registry has nothing at a path.
    pub global_fallback: bool,
}
impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            relative_parents: true,
            global_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on jobs a single `run_until_idle` call may run. `None` means unbounded.
    pub job_budget: Option<usize>,
}
impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            job_budget: Some(100_000),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub resolution: ResolutionConfig,
    pub scheduler: SchedulerConfig,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        RuntimeConfig::default()
    }

    /// Load configuration from a TOML file.
    ///
    /// Expected format:
    /// ```toml
    /// [resolution]
    /// relative_parents = true
    /// global_fallback = false
    ///
    /// [scheduler]
    /// job_budget = 5000
    /// ```
    pub fn load(path: &Path) -> Result<Self, ClassError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ClassError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing sections and keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ClassError> {
        toml::from_str(content).map_err(|e| ClassError::Config(e.to_string()))
    }
}
