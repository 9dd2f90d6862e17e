// src/config.rs

//! Configuration file for pkgctl
//!
//! Configuration is optional. Without a file every value takes its
//! default, and command-line flags override whatever the file says.
//!
//! Example `/etc/pkgctl/pkgctl.toml`:
//!
//! ```toml
//! [main]
//! cache_dir = "/var/cache/pkgctl"
//! metadata_expire_secs = 600
//! prompt_timeout_secs = 60
//!
//! [refresh]
//! # "all": abort only when every repository failed
//! # "any": abort as soon as one repository failed
//! # "never": keep going no matter how many failed
//! escalate = "all"
//!
//! [shell]
//! reload_after_repo_changes = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file location relative to the managed root
pub const DEFAULT_CONFIG_PATH: &str = "etc/pkgctl/pkgctl.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub main: MainConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub shell: ShellConfig,
}

/// Store locations and timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MainConfig {
    /// Repository definition directory (relative to the root)
    #[serde(default)]
    pub reposd_dir: Option<PathBuf>,

    /// Cache directory (relative to the root)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Raw metadata cache directory (relative to the root)
    #[serde(default)]
    pub raw_cache_dir: Option<PathBuf>,

    /// Seconds during which an up-to-date check is skipped after a refresh
    #[serde(default = "default_metadata_expire")]
    pub metadata_expire_secs: u64,

    /// Seconds before an abort/retry/ignore prompt takes its default (0 = wait)
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_secs: u64,
}

fn default_metadata_expire() -> u64 {
    600
}

fn default_prompt_timeout() -> u64 {
    60
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            reposd_dir: None,
            cache_dir: None,
            raw_cache_dir: None,
            metadata_expire_secs: default_metadata_expire(),
            prompt_timeout_secs: default_prompt_timeout(),
        }
    }
}

impl MainConfig {
    pub fn metadata_expire(&self) -> Duration {
        Duration::from_secs(self.metadata_expire_secs)
    }

    pub fn prompt_timeout(&self) -> Option<Duration> {
        match self.prompt_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// When repository failures escalate to a command-level abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPolicy {
    /// Only when every targeted repository failed
    #[default]
    All,
    /// As soon as any targeted repository failed
    Any,
    /// Never; failures are only summarized
    Never,
}

impl EscalationPolicy {
    /// Whether `failed` out of `attempted` repositories is a total failure
    pub fn escalates(self, failed: usize, attempted: usize) -> bool {
        if failed == 0 {
            return false;
        }
        match self {
            EscalationPolicy::All => failed == attempted,
            EscalationPolicy::Any => true,
            EscalationPolicy::Never => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub escalate: EscalationPolicy,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShellConfig {
    /// Clear the repository and resolvable latches after repository changes
    #[serde(default)]
    pub reload_after_repo_changes: bool,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file under `root` if it exists
    pub fn load_for_root(root: &Path, path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default = root.join(DEFAULT_CONFIG_PATH);
        if default.exists() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (key, dir) in [
            ("main.reposd_dir", &self.main.reposd_dir),
            ("main.cache_dir", &self.main.cache_dir),
            ("main.raw_cache_dir", &self.main.raw_cache_dir),
        ] {
            if let Some(dir) = dir
                && dir.as_os_str().is_empty()
            {
                anyhow::bail!("{} must not be empty", key);
            }
        }
        Ok(())
    }
}
