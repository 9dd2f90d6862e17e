// src/resolvable/loader.rs

//! Fills the resolvable pool once per process
//!
//! Every enabled repository of the active set is made loadable (raw refresh
//! if no metadata exists yet, cache build if not cached) and its resolvables
//! are added to the pool. A repository that fails at any step is reported
//! and left out; the rest still load. The installed system is added last.

use super::ResolvablePool;
use super::target::Target;
use crate::db::models::RepositoryRecord;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::repository::{ActiveRepoSet, MetadataError, MetadataService, RefreshEngine};
use tracing::{debug, warn};

/// What the last load did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    /// Reason the installed system could not be read
    pub target_error: Option<String>,
}

impl LoadSummary {
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty() || self.target_error.is_some()
    }
}

/// Options of a load
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Leave the installed system out of the pool
    pub disable_system_resolvables: bool,
}

/// Latched loader of the resolvable pool
#[derive(Debug, Default)]
pub struct ResolvableLoader {
    loaded: bool,
    summary: LoadSummary,
}

impl ResolvableLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// Forget the latch so the next `load_all` reloads
    pub fn invalidate(&mut self) {
        self.loaded = false;
    }

    /// Load repositories and the installed system into `pool`
    ///
    /// A no-op after the first successful call. Only a cache that claims to
    /// be built but cannot be read fails the whole load.
    pub fn load_all(
        &mut self,
        active: &ActiveRepoSet,
        engine: &RefreshEngine<'_>,
        metadata: &dyn MetadataService,
        target: &dyn Target,
        pool: &mut ResolvablePool,
        out: &Output,
        options: LoadOptions,
    ) -> Result<&LoadSummary> {
        if self.loaded {
            debug!("Resolvables already loaded, {} in pool", pool.len());
            return Ok(&self.summary);
        }

        *pool = ResolvablePool::new();
        let mut summary = LoadSummary::default();

        if target.is_initialized() {
            match target.locks() {
                Ok(locks) => pool.apply_locks(locks),
                Err(e) => warn!("Could not read package locks: {}", e),
            }
        }

        for repo in active.enabled() {
            match Self::load_repository(repo, engine, metadata, pool) {
                Ok(()) => summary.loaded.push(repo.alias.clone()),
                Err(LoadFailure::Inconsistent(e)) => return Err(e),
                Err(LoadFailure::Reported(detail)) => {
                    out.error(format!("Problem loading data from '{}'", repo.display_name()));
                    if !detail.is_empty() {
                        out.error(detail);
                    }
                    out.warning(format!(
                        "Resolvables from '{}' not loaded because of error.",
                        repo.display_name()
                    ));
                    out.hint("Try 'pkgctl refresh', or even 'pkgctl clean --all' before doing so.");
                    summary.failed.push(repo.alias.clone());
                }
            }
        }

        if !options.disable_system_resolvables {
            if !target.is_initialized() {
                // the failed initialization has been reported already
                debug!("Installed system not loaded, target is not initialized");
                summary.target_error = Some("target is not initialized".to_string());
            } else {
                match target.installed() {
                    Ok(installed) => pool.add_installed(installed),
                    Err(e) => {
                        out.report(&e);
                        summary.target_error = Some(e.to_string());
                    }
                }
            }
        }

        debug!(
            "Loaded {} repositories into a pool of {} resolvables",
            summary.loaded.len(),
            pool.len()
        );
        self.summary = summary;
        self.loaded = true;
        Ok(&self.summary)
    }

    fn load_repository(
        repo: &RepositoryRecord,
        engine: &RefreshEngine<'_>,
        metadata: &dyn MetadataService,
        pool: &mut ResolvablePool,
    ) -> std::result::Result<(), LoadFailure> {
        if metadata.metadata_status(repo).is_none() {
            debug!("No raw metadata for '{}', refreshing", repo.alias);
            engine
                .refresh(repo, false)
                .map_err(|e| LoadFailure::Reported(e.to_string()))?;
        }

        if !metadata.is_cached(repo) {
            engine
                .build_cache(repo, false)
                .map_err(|e| LoadFailure::Reported(e.to_string()))?;
        }

        match metadata.load_from_cache(repo) {
            Ok(resolvables) => {
                pool.add_repository(&repo.alias, repo.priority, resolvables);
                Ok(())
            }
            Err(MetadataError::NotCached) => Err(LoadFailure::Inconsistent(
                Error::InternalInconsistency(format!(
                    "cache of '{}' is reported as built but cannot be loaded",
                    repo.alias
                )),
            )),
            Err(e) => Err(LoadFailure::Reported(e.to_string())),
        }
    }
}

enum LoadFailure {
    /// Already worth a per-repository report; the load goes on
    Reported(String),
    Inconsistent(Error),
}
