// src/cli/query.rs
//! Query arguments

use clap::Args;

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchArgs {
    /// Search terms (empty: everything)
    #[arg(value_name = "TERM")]
    pub terms: Vec<String>,

    /// Search for an exact match of the search strings
    #[arg(short = 'x', long)]
    pub match_exact: bool,

    /// Search only for resolvables of the specified type
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Show only installed resolvables
    #[arg(short, long)]
    pub installed_only: bool,

    /// Show only resolvables that are not installed
    #[arg(short, long)]
    pub uninstalled_only: bool,

    /// Search only in the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoArgs {
    /// Names of resolvables
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Type of resolvable
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Work only with the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}

/// Arguments of the per-kind listings
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ListArgs {
    /// Repositories to list from (default: all enabled)
    #[arg(value_name = "ALIAS|#|URI")]
    pub selectors: Vec<String>,

    /// Show only installed items
    #[arg(short, long)]
    pub installed_only: bool,

    /// Show only items that are not installed
    #[arg(short, long)]
    pub uninstalled_only: bool,

    /// Work only with the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}

impl ListArgs {
    pub fn all_selectors(&self) -> Vec<String> {
        self.selectors.iter().chain(&self.repos).cloned().collect()
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CapabilityArgs {
    /// Capability, optionally with a version constraint
    #[arg(value_name = "CAPABILITY")]
    pub capability: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ListUpdatesArgs {
    /// Type of updates (package, patch)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// List only updates from the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,
}
