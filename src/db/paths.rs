// src/db/paths.rs
//! Centralized path derivation for pkgctl stores
//!
//! All locations hang off the managed system root. Directory overrides from
//! the command line or configuration are taken relative to the root unless
//! they are absolute, in which case they are used verbatim.

use std::path::{Path, PathBuf};

/// Default repository definition directory, relative to the root
pub const DEFAULT_REPOSD_DIR: &str = "etc/pkgctl/repos.d";

/// Default cache directory, relative to the root
pub const DEFAULT_CACHE_DIR: &str = "var/cache/pkgctl";

/// Default target directory, relative to the root
pub const DEFAULT_TARGET_DIR: &str = "var/lib/pkgctl";

/// Resolved store locations for one system root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub root: PathBuf,
    pub reposd_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub raw_cache_dir: PathBuf,
}

fn under_root(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

impl StorePaths {
    /// Default layout below `root`
    pub fn for_root(root: &Path) -> Self {
        let cache_dir = root.join(DEFAULT_CACHE_DIR);
        Self {
            root: root.to_path_buf(),
            reposd_dir: root.join(DEFAULT_REPOSD_DIR),
            raw_cache_dir: cache_dir.join("raw"),
            cache_dir,
        }
    }

    /// Apply directory overrides
    ///
    /// Overriding the cache directory moves the raw cache with it unless the
    /// raw cache is overridden too.
    pub fn with_overrides(
        root: &Path,
        reposd_dir: Option<&Path>,
        cache_dir: Option<&Path>,
        raw_cache_dir: Option<&Path>,
    ) -> Self {
        let mut paths = Self::for_root(root);
        if let Some(dir) = reposd_dir {
            paths.reposd_dir = under_root(root, dir);
        }
        if let Some(dir) = cache_dir {
            paths.cache_dir = under_root(root, dir);
            paths.raw_cache_dir = paths.cache_dir.join("raw");
        }
        if let Some(dir) = raw_cache_dir {
            paths.raw_cache_dir = under_root(root, dir);
        }
        paths
    }

    /// Repository store database
    pub fn repos_db(&self) -> PathBuf {
        self.reposd_dir.join("repos.db")
    }

    /// Resolvable cache database
    pub fn cache_db(&self) -> PathBuf {
        self.cache_dir.join("cache.db")
    }

    /// Raw metadata directory of one repository
    pub fn raw_dir(&self, alias: &str) -> PathBuf {
        self.raw_cache_dir.join(alias)
    }

    /// Downloaded packages of one repository
    pub fn packages_dir(&self, alias: &str) -> PathBuf {
        self.cache_dir.join("packages").join(alias)
    }

    /// Installed-system database
    pub fn target_db(&self) -> PathBuf {
        self.root.join(DEFAULT_TARGET_DIR).join("target.db")
    }
}
