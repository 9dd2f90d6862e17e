// src/cli/mod.rs
//! CLI definitions for pkgctl
//!
//! This module contains all command-line interface definitions using clap.
//! The workflows behind each command are in the `commands` module, and the
//! `session` module sequences them.
//!
//! Global options come before the command name, like `pkgctl -n --root /mnt
//! install vim`. Every command has a short alias (`in`, `lr`, `ref`, ...).
//!
//! Command groups:
//! - Repository management: `repos`, `addrepo`, `removerepo`, `renamerepo`,
//!   `modifyrepo`, `refresh`, `clean`
//! - Services: `services`, `addservice`, `removeservice`, `refresh-services`
//! - Software management: `install`, `remove`, `update`, `dist-upgrade`,
//!   `verify`, `source-install`, `install-new-recommends`
//! - Queries: `search`, `info`, `packages`, `patches`, `patterns`,
//!   `products`, `what-provides`, `what-requires`, `what-conflicts`,
//!   `list-updates`, `patch-check`
//! - Package locks: `addlock`, `removelock`, `locks`, `cleanlocks`
//! - Interactive: `shell`, `quit`

use crate::session::ControlSignal;
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

mod package;
mod query;
mod repo;

pub use package::{InstallArgs, LockArgs, PackageArgs, RemoveLockArgs, UpgradeArgs};
pub use query::{CapabilityArgs, InfoArgs, ListArgs, ListUpdatesArgs, SearchArgs};
pub use repo::{
    AddRepoArgs, AddServiceArgs, CleanArgs, ModifyRepoArgs, RefreshArgs, RenameRepoArgs,
    ReposArgs, SelectorArgs,
};

#[derive(Parser, Debug)]
#[command(name = "pkgctl")]
#[command(author = "pkgctl Contributors")]
#[command(version)]
#[command(about = "Command-line package manager with repository lifecycle management", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options accepted before the command name
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Suppress normal output, print only error messages
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase verbosity (repeat for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Switch to machine-readable (JSON) output
    #[arg(long)]
    pub json: bool,

    /// Do not ask anything, use default answers automatically
    #[arg(short, long)]
    pub non_interactive: bool,

    /// Operate on a different root directory (absolute path)
    #[arg(short = 'R', long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Use an alternative repository definition directory
    #[arg(short = 'D', long, value_name = "DIR")]
    pub reposd_dir: Option<PathBuf>,

    /// Use an alternative cache directory
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Use an alternative raw metadata cache directory
    #[arg(long, value_name = "DIR")]
    pub raw_cache_dir: Option<PathBuf>,

    /// Use an alternative configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an additional repository for this run
    #[arg(short = 'p', long = "plus-repo", value_name = "URI")]
    pub plus_repos: Vec<String>,

    /// Do not refresh repositories automatically
    #[arg(long)]
    pub no_refresh: bool,

    /// Do not read metadata from repositories
    #[arg(long)]
    pub disable_repositories: bool,

    /// Do not read installed packages
    #[arg(long)]
    pub disable_system_resolvables: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // =========================================================================
    // Repository Management
    // =========================================================================
    /// List all defined repositories
    #[command(visible_alias = "lr")]
    Repos(ReposArgs),

    /// Add a new repository
    #[command(visible_alias = "ar")]
    Addrepo(AddRepoArgs),

    /// Remove specified repositories
    #[command(visible_alias = "rr")]
    Removerepo(SelectorArgs),

    /// Rename a repository
    #[command(visible_alias = "nr")]
    Renamerepo(RenameRepoArgs),

    /// Modify specified repositories
    #[command(visible_alias = "mr")]
    Modifyrepo(ModifyRepoArgs),

    /// Refresh all repositories
    #[command(visible_alias = "ref")]
    Refresh(RefreshArgs),

    /// Clean local caches
    #[command(visible_alias = "cc")]
    Clean(CleanArgs),

    // =========================================================================
    // Service Management
    // =========================================================================
    /// List all defined services
    #[command(visible_alias = "ls")]
    Services,

    /// Add a new service
    #[command(visible_alias = "as")]
    Addservice(AddServiceArgs),

    /// Remove specified service and its repositories
    #[command(visible_alias = "rs")]
    Removeservice(SelectorArgs),

    /// Refresh all services
    #[command(visible_alias = "refs")]
    RefreshServices,

    // =========================================================================
    // Software Management
    // =========================================================================
    /// Install packages
    #[command(visible_alias = "in")]
    Install(InstallArgs),

    /// Remove packages
    #[command(visible_alias = "rm")]
    Remove(PackageArgs),

    /// Update installed packages with newer versions
    #[command(visible_alias = "up")]
    Update(PackageArgs),

    /// Perform a distribution upgrade
    #[command(visible_alias = "dup")]
    DistUpgrade(UpgradeArgs),

    /// Verify integrity of package dependencies
    #[command(visible_alias = "ve")]
    Verify(UpgradeArgs),

    /// Install source packages
    #[command(visible_alias = "si")]
    SourceInstall(PackageArgs),

    /// Install newly added packages recommended by installed packages
    #[command(visible_alias = "inr")]
    InstallNewRecommends(UpgradeArgs),

    // =========================================================================
    // Queries
    // =========================================================================
    /// Search for packages matching a pattern
    #[command(visible_alias = "se")]
    Search(SearchArgs),

    /// Show full information for specified packages
    #[command(visible_alias = "if")]
    Info(InfoArgs),

    /// List all available packages
    #[command(visible_alias = "pa")]
    Packages(ListArgs),

    /// List all available patches
    #[command(visible_alias = "pch")]
    Patches(ListArgs),

    /// List all available patterns
    #[command(visible_alias = "pt")]
    Patterns(ListArgs),

    /// List all available products
    #[command(visible_alias = "pd")]
    Products(ListArgs),

    /// List packages providing a capability
    #[command(visible_alias = "wp")]
    WhatProvides(CapabilityArgs),

    /// List packages requiring a capability
    #[command(visible_alias = "wr")]
    WhatRequires(CapabilityArgs),

    /// List packages conflicting with a capability
    #[command(visible_alias = "wc")]
    WhatConflicts(CapabilityArgs),

    /// List available updates
    #[command(visible_alias = "lu")]
    ListUpdates(ListUpdatesArgs),

    /// Check for patches (exit 100: updates, 101: security updates)
    #[command(visible_alias = "pchk")]
    PatchCheck(ListArgs),

    // =========================================================================
    // Package Locks
    // =========================================================================
    /// Add a package lock
    #[command(visible_alias = "al")]
    Addlock(LockArgs),

    /// Remove a package lock
    #[command(visible_alias = "rl")]
    Removelock(RemoveLockArgs),

    /// List current package locks
    #[command(visible_alias = "ll")]
    Locks,

    /// Remove all package locks
    #[command(visible_alias = "cl")]
    Cleanlocks,

    // =========================================================================
    // Interactive
    // =========================================================================
    /// Accept multiple commands at once
    #[command(visible_alias = "sh")]
    Shell,

    /// Leave the shell
    #[command(visible_alias = "exit")]
    Quit,
}

impl Command {
    /// Name the command was defined with
    pub fn name(&self) -> &'static str {
        match self {
            Command::Repos(_) => "repos",
            Command::Addrepo(_) => "addrepo",
            Command::Removerepo(_) => "removerepo",
            Command::Renamerepo(_) => "renamerepo",
            Command::Modifyrepo(_) => "modifyrepo",
            Command::Refresh(_) => "refresh",
            Command::Clean(_) => "clean",
            Command::Services => "services",
            Command::Addservice(_) => "addservice",
            Command::Removeservice(_) => "removeservice",
            Command::RefreshServices => "refresh-services",
            Command::Install(_) => "install",
            Command::Remove(_) => "remove",
            Command::Update(_) => "update",
            Command::DistUpgrade(_) => "dist-upgrade",
            Command::Verify(_) => "verify",
            Command::SourceInstall(_) => "source-install",
            Command::InstallNewRecommends(_) => "install-new-recommends",
            Command::Search(_) => "search",
            Command::Info(_) => "info",
            Command::Packages(_) => "packages",
            Command::Patches(_) => "patches",
            Command::Patterns(_) => "patterns",
            Command::Products(_) => "products",
            Command::WhatProvides(_) => "what-provides",
            Command::WhatRequires(_) => "what-requires",
            Command::WhatConflicts(_) => "what-conflicts",
            Command::ListUpdates(_) => "list-updates",
            Command::PatchCheck(_) => "patch-check",
            Command::Addlock(_) => "addlock",
            Command::Removelock(_) => "removelock",
            Command::Locks => "locks",
            Command::Cleanlocks => "cleanlocks",
            Command::Shell => "shell",
            Command::Quit => "quit",
        }
    }

    /// Whether the command changes the system or its repository setup
    pub fn needs_privileges(&self) -> bool {
        matches!(
            self,
            Command::Addrepo(_)
                | Command::Removerepo(_)
                | Command::Renamerepo(_)
                | Command::Modifyrepo(_)
                | Command::Refresh(_)
                | Command::Clean(_)
                | Command::Addservice(_)
                | Command::Removeservice(_)
                | Command::RefreshServices
                | Command::Install(_)
                | Command::Remove(_)
                | Command::Update(_)
                | Command::DistUpgrade(_)
                | Command::Verify(_)
                | Command::SourceInstall(_)
                | Command::InstallNewRecommends(_)
                | Command::Addlock(_)
                | Command::Removelock(_)
                | Command::Cleanlocks
        )
    }

    /// Whether the command must hold the system lock
    pub fn needs_lock(&self) -> bool {
        !matches!(
            self,
            Command::Repos(_) | Command::Services | Command::Locks | Command::Shell | Command::Quit
        )
    }

    /// Commands that never use temporary `--plus-repo` repositories
    pub fn ignores_plus_repos(&self) -> bool {
        matches!(
            self,
            Command::Addrepo(_)
                | Command::Removerepo(_)
                | Command::Renamerepo(_)
                | Command::Modifyrepo(_)
                | Command::Refresh(_)
                | Command::Clean(_)
                | Command::Addservice(_)
                | Command::Removeservice(_)
                | Command::RefreshServices
                | Command::Removelock(_)
        )
    }

    /// Whether the command alters the stored repository or service set
    pub fn changes_repositories(&self) -> bool {
        matches!(
            self,
            Command::Addrepo(_)
                | Command::Removerepo(_)
                | Command::Renamerepo(_)
                | Command::Modifyrepo(_)
                | Command::Refresh(_)
                | Command::Clean(_)
                | Command::Addservice(_)
                | Command::Removeservice(_)
                | Command::RefreshServices
        )
    }
}

/// One line of input in shell mode: a command without global options
#[derive(Parser, Debug)]
#[command(name = "pkgctl", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

/// Turn a clap failure into a control signal
///
/// Help and version output is printed and ends the command successfully;
/// anything else is a syntax error.
pub fn parse_failure(err: clap::Error) -> ControlSignal {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let _ = err.print();
            ControlSignal::ShowHelpAndExit
        }
        _ => {
            let _ = err.print();
            ControlSignal::ExitWithCode(crate::exit_code::ExitCode::Syntax)
        }
    }
}

/// Parse the process arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, ControlSignal>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(parse_failure)
}

/// Parse one tokenized shell line
pub fn parse_shell_line<I, T>(tokens: I) -> Result<Command, ControlSignal>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ShellLine::try_parse_from(tokens)
        .map(|line| line.command)
        .map_err(parse_failure)
}
