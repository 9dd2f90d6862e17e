// src/cli/package.rs
//! Software management and package lock arguments

use clap::Args;

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallArgs {
    /// Names to install, optionally with a version constraint ("vim>=9")
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Type of resolvable (package, patch, pattern, product)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Load only the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,

    /// Test the installation, do not actually install
    #[arg(short = 'D', long)]
    pub dry_run: bool,
}

/// Arguments shared by remove, update and source-install
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageArgs {
    /// Names of resolvables
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Type of resolvable (package, patch, pattern, product)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Load only the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,

    /// Test the operation, do not actually change anything
    #[arg(short = 'D', long)]
    pub dry_run: bool,
}

/// Arguments of dist-upgrade and verify
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct UpgradeArgs {
    /// Load only the specified repositories
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repos: Vec<String>,

    /// Test the operation, do not actually change anything
    #[arg(short = 'D', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct LockArgs {
    /// Names to lock (wildcards allowed)
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Type of resolvable
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Restrict the lock to the specified repository
    #[arg(short, long = "repo", value_name = "ALIAS|#|URI")]
    pub repo: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveLockArgs {
    /// Lock names or numbers from the `locks` listing
    #[arg(required = true, value_name = "NAME|#")]
    pub locks: Vec<String>,

    /// Type of resolvable
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub kind: Option<String>,
}
