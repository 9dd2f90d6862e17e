// src/cli/repo.rs
//! Repository and service management arguments

use clap::Args;
use std::path::PathBuf;

/// Repositories or services given by alias, number or URI
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SelectorArgs {
    /// Alias, number or URI
    #[arg(required = true, value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ReposArgs {
    /// Repositories to list (default: all)
    #[arg(value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,

    /// Show also base URI of repositories
    #[arg(short, long)]
    pub uri: bool,

    /// Show also repository priority
    #[arg(short = 'P', long)]
    pub priority: bool,

    /// Show more information like URI, priority, type
    #[arg(short, long)]
    pub details: bool,

    /// Export all defined repositories as a single repository file
    #[arg(short, long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct AddRepoArgs {
    /// Repository URI, or a repository definition file
    #[arg(value_name = "URI|FILE")]
    pub uri: String,

    /// Alias of the new repository (default: a timestamp)
    pub alias: Option<String>,

    /// Type of repository (rpm-md, yast2, plaindir)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub repo_type: Option<String>,

    /// Set a descriptive name for the repository
    #[arg(short = 'N', long)]
    pub name: Option<String>,

    /// Add the repository as disabled
    #[arg(short, long)]
    pub disable: bool,

    /// Enable autorefresh of the repository
    #[arg(short = 'f', long)]
    pub refresh: bool,

    /// Disable autorefresh of the repository
    #[arg(short = 'F', long)]
    pub no_refresh: bool,

    /// Enable RPM files caching
    #[arg(short, long)]
    pub keep_packages: bool,

    /// Set priority of the repository (lower number = higher priority)
    #[arg(short, long, value_name = "N")]
    pub priority: Option<u32>,

    /// Probe URI
    #[arg(short, long)]
    pub check: bool,

    /// Don't probe URI, probe later during refresh
    #[arg(short = 'C', long)]
    pub no_check: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RenameRepoArgs {
    /// Repository to rename
    #[arg(value_name = "ALIAS|#|URI")]
    pub selector: String,

    /// New alias
    pub new_alias: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ModifyRepoArgs {
    /// Repositories to modify
    #[arg(value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,

    /// Enable the repository
    #[arg(short, long)]
    pub enable: bool,

    /// Disable the repository
    #[arg(short, long)]
    pub disable: bool,

    /// Enable auto-refresh of the repository
    #[arg(short = 'f', long)]
    pub refresh: bool,

    /// Disable auto-refresh of the repository
    #[arg(short = 'F', long)]
    pub no_refresh: bool,

    /// Enable RPM files caching
    #[arg(short, long)]
    pub keep_packages: bool,

    /// Disable RPM files caching
    #[arg(short = 'K', long)]
    pub no_keep_packages: bool,

    /// Set priority of the repository
    #[arg(short, long, value_name = "N")]
    pub priority: Option<u32>,

    /// Set a descriptive name for the repository
    #[arg(short = 'N', long)]
    pub name: Option<String>,

    /// Apply changes to all repositories
    #[arg(short, long)]
    pub all: bool,

    /// Apply changes to all local repositories
    #[arg(short, long)]
    pub local: bool,

    /// Apply changes to all remote repositories
    #[arg(short = 't', long)]
    pub remote: bool,

    /// Apply changes to repositories of specified type (URI scheme)
    #[arg(short, long, value_name = "TYPE")]
    pub medium_type: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct RefreshArgs {
    /// Repositories to refresh (default: all enabled)
    #[arg(value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,

    /// Force a complete refresh
    #[arg(short, long)]
    pub force: bool,

    /// Force rebuild of the database
    #[arg(short = 'b', long)]
    pub force_build: bool,

    /// Force download of raw metadata
    #[arg(short = 'd', long)]
    pub force_download: bool,

    /// Only build the database, don't download metadata
    #[arg(short = 'B', long)]
    pub build_only: bool,

    /// Only download raw metadata, don't build the database
    #[arg(short = 'D', long)]
    pub download_only: bool,

    /// Refresh only specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}

impl RefreshArgs {
    /// Positional and `--repo` selectors together
    pub fn all_selectors(&self) -> Vec<String> {
        self.selectors.iter().chain(&self.repos).cloned().collect()
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanArgs {
    /// Repositories to clean (default: all)
    #[arg(value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,

    /// Clean metadata cache
    #[arg(short, long)]
    pub metadata: bool,

    /// Clean raw metadata cache
    #[arg(short = 'M', long)]
    pub raw_metadata: bool,

    /// Clean both metadata and package caches
    #[arg(short, long)]
    pub all: bool,

    /// Clean only specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}

impl CleanArgs {
    pub fn all_selectors(&self) -> Vec<String> {
        self.selectors.iter().chain(&self.repos).cloned().collect()
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddServiceArgs {
    /// Service URI
    #[arg(value_name = "URI")]
    pub uri: String,

    /// Alias of the new service (default: a timestamp)
    pub alias: Option<String>,

    /// Set a descriptive name for the service
    #[arg(short = 'N', long)]
    pub name: Option<String>,
}
