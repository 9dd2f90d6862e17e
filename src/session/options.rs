// src/session/options.rs

//! Validated global options
//!
//! Global options are parsed once per process. Directory overrides from the
//! command line win over the configuration file, which wins over the
//! built-in layout.

use crate::cli::GlobalArgs;
use crate::config::Config;
use crate::db::paths::StorePaths;
use crate::error::{Error, Result};
use crate::output::Verbosity;
use std::path::{Path, PathBuf};
use url::Url;

/// Global options of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOptions {
    pub verbosity: Verbosity,
    pub machine_readable: bool,
    pub non_interactive: bool,
    /// Managed system root
    pub root: PathBuf,
    /// Whether `--root` points away from `/`
    pub root_changed: bool,
    pub reposd_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub raw_cache_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    /// Temporary repositories for this process
    pub plus_repos: Vec<Url>,
    pub no_refresh: bool,
    pub disable_repositories: bool,
    pub disable_system_resolvables: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            machine_readable: false,
            non_interactive: false,
            root: PathBuf::from("/"),
            root_changed: false,
            reposd_dir: None,
            cache_dir: None,
            raw_cache_dir: None,
            config_path: None,
            plus_repos: Vec::new(),
            no_refresh: false,
            disable_repositories: false,
            disable_system_resolvables: false,
        }
    }
}

impl GlobalOptions {
    /// Validate parsed global arguments
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let mut options = GlobalOptions {
            verbosity: Verbosity::from_flags(args.quiet, args.verbose),
            machine_readable: args.json,
            non_interactive: args.non_interactive,
            reposd_dir: args.reposd_dir.clone(),
            cache_dir: args.cache_dir.clone(),
            raw_cache_dir: args.raw_cache_dir.clone(),
            config_path: args.config.clone(),
            no_refresh: args.no_refresh,
            disable_repositories: args.disable_repositories,
            disable_system_resolvables: args.disable_system_resolvables,
            ..Default::default()
        };

        if let Some(root) = &args.root {
            options.set_root(root)?;
        }

        options.plus_repos = args
            .plus_repos
            .iter()
            .map(|uri| parse_repo_uri(uri))
            .collect::<Result<_>>()?;

        Ok(options)
    }

    /// Use `root` as the managed system root; it must be absolute
    pub fn set_root(&mut self, root: &Path) -> Result<()> {
        if !root.is_absolute() {
            return Err(Error::InvalidArgument(format!(
                "The path specified in the --root option must be absolute: '{}'",
                root.display()
            )));
        }
        self.root_changed = root != Path::new("/");
        self.root = root.to_path_buf();
        Ok(())
    }

    /// Store locations: command line, then configuration, then defaults
    pub fn store_paths(&self, config: &Config) -> StorePaths {
        StorePaths::with_overrides(
            &self.root,
            self.reposd_dir.as_deref().or(config.main.reposd_dir.as_deref()),
            self.cache_dir.as_deref().or(config.main.cache_dir.as_deref()),
            self.raw_cache_dir
                .as_deref()
                .or(config.main.raw_cache_dir.as_deref()),
        )
    }
}

/// Parse a repository location given as a URI or a local directory
pub fn parse_repo_uri(input: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(input)
        && url.scheme().len() > 1
    {
        return Ok(url);
    }

    let path = Path::new(input);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_directory_path(&absolute).map_err(|_| {
        Error::InvalidArgument(format!("'{}' is not a valid URI or directory path.", input))
    })
}
