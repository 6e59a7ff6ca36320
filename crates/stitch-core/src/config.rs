//! Resolver configuration.
//!
//! Loaded from a `stitch.toml` next to the graph declarations. Every field
//! has a default, so an empty or missing file yields [`ResolverConfig::default`].
//!
//! ```toml
//! missing = "ignore"
//! cycles = "fail-fast"
//! prune_unreachable = false
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do with an edge whose target has no binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Abort resolution with a missing-binding error.
    #[default]
    Fail,
    /// Drop the edge and keep going.
    Ignore,
}

/// How many hard cycles to gather before failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Stop at the first unbreakable cycle.
    FailFast,
    /// Examine every component and report all unbreakable cycles together.
    #[default]
    Collect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub missing: MissingPolicy,
    #[serde(default)]
    pub cycles: CyclePolicy,
    /// Restrict ordering to keys reachable from the requested roots.
    #[serde(default = "default_true")]
    pub prune_unreachable: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::default(),
            cycles: CyclePolicy::default(),
            prune_unreachable: default_true(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Load a [`ResolverConfig`] from `path`, falling back to defaults when the
/// file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_resolver_config(path: &Path) -> Result<ResolverConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no resolver config, using defaults");
        return Ok(ResolverConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ResolverConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
