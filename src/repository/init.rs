// src/repository/init.rs

//! Active repository set for a command
//!
//! `RepoSetInitializer` turns selectors, plus-repositories and the stored
//! definitions into the `ActiveRepoSet` a command works on, refreshing and
//! caching each enabled repository on the way. The computed set is latched:
//! later calls return the same set until `invalidate` is called.

use super::locator::locate_many;
use super::metadata::MetadataService;
use super::refresh::{RefreshEngine, RefreshOutcome, RefreshState};
use super::store::RepoStore;
use crate::config::EscalationPolicy;
use crate::db::models::RepositoryRecord;
use crate::error::{Error, Result};
use crate::output::Output;
use std::rc::Rc;
use tracing::{debug, info, warn};
use url::Url;

/// Alias prefix of temporary repositories given on the command line
pub const PLUS_REPO_PREFIX: &str = "tmp";

/// One repository of the active set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRepo {
    /// Definition as used by this command; `enabled` is cleared when the
    /// repository is disabled for the rest of the command
    pub record: RepositoryRecord,
    pub state: RefreshState,
    /// `None` for repositories disabled in their definition
    pub outcome: Option<RefreshOutcome>,
}

impl ActiveRepo {
    pub fn is_enabled(&self) -> bool {
        self.record.enabled
    }
}

/// How badly the refresh pass went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    None,
    Partial,
    Total,
}

/// Per-command tally of refresh failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Enabled repositories that went through refresh/cache building
    pub attempted: usize,
    /// Aliases disabled because of an error
    pub failed: Vec<String>,
    /// Aliases left enabled with stale metadata (no write access)
    pub stale: Vec<String>,
}

impl RefreshSummary {
    pub fn scope(&self, policy: EscalationPolicy) -> FailureScope {
        if self.failed.is_empty() {
            FailureScope::None
        } else if policy.escalates(self.failed.len(), self.attempted) {
            FailureScope::Total
        } else {
            FailureScope::Partial
        }
    }
}

/// Ordered, deduplicated repositories used by the current command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveRepoSet {
    pub repos: Vec<ActiveRepo>,
    pub summary: RefreshSummary,
}

impl ActiveRepoSet {
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn get(&self, alias: &str) -> Option<&ActiveRepo> {
        self.repos.iter().find(|r| r.record.alias == alias)
    }

    /// Repositories still enabled, in enumeration order
    pub fn enabled(&self) -> impl Iterator<Item = &RepositoryRecord> {
        self.repos
            .iter()
            .filter(|r| r.is_enabled())
            .map(|r| &r.record)
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.repos.iter().map(|r| r.record.alias.as_str()).collect()
    }
}

/// What a command asks of the initializer
#[derive(Debug, Clone, Default)]
pub struct InitRequest {
    /// Repository selectors (`--repo` and positional containers)
    pub selectors: Vec<String>,
    /// Temporary repositories for this process
    pub plus_repos: Vec<Url>,
    /// Skip raw metadata refresh; caches are still built
    pub no_refresh: bool,
    /// Use no repositories at all
    pub disable_repositories: bool,
    /// Whether failures may disable repositories (privileged run)
    pub may_write: bool,
}

/// Builds and latches the active repository set
#[derive(Debug, Default)]
pub struct RepoSetInitializer {
    active: Option<Rc<ActiveRepoSet>>,
    plus_repos: Vec<RepositoryRecord>,
    escalation: EscalationPolicy,
}

impl RepoSetInitializer {
    pub fn new(escalation: EscalationPolicy) -> Self {
        Self {
            active: None,
            plus_repos: Vec::new(),
            escalation,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// The latched set, if initialization already ran
    pub fn active(&self) -> Option<Rc<ActiveRepoSet>> {
        self.active.clone()
    }

    /// Forget the latched set so the next `initialize` starts over
    pub fn invalidate(&mut self) {
        if self.active.take().is_some() {
            debug!("Active repository set invalidated");
        }
    }

    /// Temporary repositories registered in the store so far
    pub fn plus_repos(&self) -> &[RepositoryRecord] {
        &self.plus_repos
    }

    /// Compute the active set, or return the latched one
    pub fn initialize(
        &mut self,
        store: &dyn RepoStore,
        engine: &RefreshEngine<'_>,
        out: &Output,
        request: &InitRequest,
    ) -> Result<Rc<ActiveRepoSet>> {
        if let Some(active) = &self.active {
            debug!("Repositories already initialized, reusing {} entries", active.len());
            return Ok(Rc::clone(active));
        }

        if request.disable_repositories {
            debug!("Repositories disabled for this command");
            let active = Rc::new(ActiveRepoSet::default());
            self.active = Some(Rc::clone(&active));
            return Ok(active);
        }

        let known = store.repositories()?;
        let mut candidates = if request.selectors.is_empty() {
            known.clone()
        } else {
            let located = locate_many(&request.selectors, &known);
            if !located.unmatched.is_empty() {
                return Err(Error::InvalidSelectors(located.unmatched));
            }
            located.matched
        };

        for plus in self.register_plus_repos(store, &request.plus_repos)? {
            if !candidates.iter().any(|c| c.alias == plus.alias) {
                candidates.push(plus);
            }
        }

        let mut set = ActiveRepoSet::default();
        for mut record in candidates {
            if !record.enabled {
                set.repos.push(ActiveRepo {
                    record,
                    state: RefreshState::Disabled,
                    outcome: None,
                });
                continue;
            }

            let do_refresh = record.autorefresh && !request.no_refresh;
            set.summary.attempted += 1;
            let track = engine.auto_refresh(&mut record, request.may_write, do_refresh)?;

            if track.is_disabled() {
                set.summary.failed.push(record.alias.clone());
            } else if track.outcome == Some(RefreshOutcome::StaleNeedsPrivileges) {
                set.summary.stale.push(record.alias.clone());
            }
            set.repos.push(ActiveRepo {
                record,
                state: track.state,
                outcome: track.outcome,
            });
        }

        match set.summary.scope(self.escalation) {
            FailureScope::Total => {
                out.error("Could not refresh the repositories because of errors.");
                return Err(Error::RepositoryError(format!(
                    "{} of {} repositories failed",
                    set.summary.failed.len(),
                    set.summary.attempted
                )));
            }
            FailureScope::Partial => {
                out.warning("Some of the repositories have not been refreshed because of an error.");
            }
            FailureScope::None => {}
        }

        info!(
            "Initialized {} repositories ({} failed)",
            set.len(),
            set.summary.failed.len()
        );
        let active = Rc::new(set);
        self.active = Some(Rc::clone(&active));
        Ok(active)
    }

    /// Register temporary repositories `tmp1`, `tmp2`, ... once per process
    fn register_plus_repos(
        &mut self,
        store: &dyn RepoStore,
        urls: &[Url],
    ) -> Result<Vec<RepositoryRecord>> {
        if !self.plus_repos.is_empty() || urls.is_empty() {
            return Ok(self.plus_repos.clone());
        }

        let mut counter = 0;
        for url in urls {
            let alias = loop {
                counter += 1;
                let candidate = format!("{}{}", PLUS_REPO_PREFIX, counter);
                if store.repository(&candidate)?.is_none() {
                    break candidate;
                }
            };

            let mut repo = RepositoryRecord::new(alias, vec![url.clone()]);
            repo.name = url.to_string();
            repo.autorefresh = true;
            store.add_repository(&repo)?;
            debug!("Registered temporary repository '{}' for {}", repo.alias, url);
            self.plus_repos.push(repo);
        }
        Ok(self.plus_repos.clone())
    }

    /// Unregister temporary repositories and drop their caches
    pub fn cleanup(&mut self, store: &dyn RepoStore, metadata: &dyn MetadataService) {
        for repo in self.plus_repos.drain(..) {
            if let Err(e) = metadata.clean_cache(&repo) {
                debug!("Could not clean cache of '{}': {}", repo.alias, e);
            }
            if let Err(e) = metadata.clean_raw_metadata(&repo) {
                debug!("Could not clean raw metadata of '{}': {}", repo.alias, e);
            }
            match store.remove_repository(&repo.alias) {
                Ok(()) => debug!("Unregistered temporary repository '{}'", repo.alias),
                Err(e) => warn!("Could not remove temporary repository '{}': {}", repo.alias, e),
            }
        }
    }
}
