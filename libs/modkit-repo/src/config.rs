//! Configuration for repositories

use crate::domain::pagination::PageLimits;
use anyhow::{bail, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment prefix, e.g. `MODKIT_REPO_MAX_PAGE_SIZE=200`
pub const ENV_PREFIX: &str = "MODKIT_REPO_";

/// Repository configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Upper bound for any page; larger requests are clamped
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Page size when a request does not name one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Commit at the end of every mutating operation instead of flushing
    #[serde(default)]
    pub auto_commit: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
            auto_commit: false,
        }
    }
}

impl RepositoryConfig {
    /// Defaults, then the optional YAML file, then `MODKIT_REPO_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            bail!("max_page_size must be greater than zero");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            bail!(
                "default_page_size must be within 1..={}, got {}",
                self.max_page_size,
                self.default_page_size
            );
        }
        Ok(())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn default_max_page_size() -> u64 {
    100
}

fn default_page_size() -> u64 {
    20
}
