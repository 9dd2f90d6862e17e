// src/resolvable/mod.rs

//! Resolvable pool and its collaborators
//!
//! The pool holds every resolvable known to the current command: the
//! cached contents of the enabled repositories and the installed system.
//! Only the `ResolvableLoader` fills it; commands mark items for install
//! or removal and hand the pool to the solver.

mod loader;
mod solver;
mod target;

pub use loader::{LoadOptions, LoadSummary, ResolvableLoader};
pub use solver::{Change, Resolution, SimpleSolver, Solver, SystemStatus, Update};
pub use target::{SqliteTarget, Target};

use crate::db::models::{PackageLock, Resolvable, ResolvableKind};
use crate::error::{Error, Result};
use crate::version::Capability;
use std::cmp::Ordering;
use tracing::debug;

/// Index of an item in the pool
pub type ItemId = usize;

/// Wanted state of a pool item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transact {
    #[default]
    Keep,
    Install,
    Remove,
}

/// A resolvable with its pool state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolItem {
    pub resolvable: Resolvable,
    /// Entry of the installed system (as opposed to a repository)
    pub installed: bool,
    /// Priority of the originating repository
    pub priority: u32,
    pub locked: bool,
    pub transact: Transact,
}

impl PoolItem {
    pub fn kind(&self) -> ResolvableKind {
        self.resolvable.kind
    }

    pub fn name(&self) -> &str {
        &self.resolvable.name
    }

    /// Repository alias, or `@System` for installed items
    pub fn repository(&self) -> &str {
        self.resolvable.repo_alias.as_deref().unwrap_or("@System")
    }

    fn compare_edition(&self, other: &PoolItem) -> Ordering {
        match (self.resolvable.parsed_edition(), other.resolvable.parsed_edition()) {
            (Ok(a), Ok(b)) => a.compare(&b),
            _ => self.resolvable.edition.cmp(&other.resolvable.edition),
        }
    }
}

/// Search criteria for pool queries
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub kind: Option<ResolvableKind>,
    pub match_exact: bool,
    pub installed_only: bool,
    pub uninstalled_only: bool,
}

/// All resolvables of the current command
#[derive(Debug, Clone, Default)]
pub struct ResolvablePool {
    items: Vec<PoolItem>,
    locks: Vec<PackageLock>,
}

impl ResolvablePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: ItemId) -> &PoolItem {
        &self.items[id]
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &PoolItem)> {
        self.items.iter().enumerate()
    }

    /// Add the cached resolvables of one repository
    pub fn add_repository(&mut self, alias: &str, priority: u32, resolvables: Vec<Resolvable>) {
        debug!("Adding {} resolvables from '{}'", resolvables.len(), alias);
        for mut resolvable in resolvables {
            resolvable.repo_alias = Some(alias.to_string());
            self.push(resolvable, false, priority);
        }
    }

    /// Add the installed system
    pub fn add_installed(&mut self, resolvables: Vec<Resolvable>) {
        debug!("Adding {} installed resolvables", resolvables.len());
        for mut resolvable in resolvables {
            resolvable.repo_alias = None;
            self.push(resolvable, true, 0);
        }
    }

    fn push(&mut self, resolvable: Resolvable, installed: bool, priority: u32) {
        let locked = self.locks.iter().any(|l| l.applies_to(&resolvable));
        self.items.push(PoolItem {
            resolvable,
            installed,
            priority,
            locked,
            transact: Transact::Keep,
        });
    }

    /// Apply package locks to every current and future item
    pub fn apply_locks(&mut self, locks: Vec<PackageLock>) {
        for item in &mut self.items {
            item.locked = locks.iter().any(|l| l.applies_to(&item.resolvable));
        }
        self.locks = locks;
    }

    pub fn has_repository(&self, alias: &str) -> bool {
        self.items
            .iter()
            .any(|i| i.resolvable.repo_alias.as_deref() == Some(alias))
    }

    /// Items of one kind, in pool order
    pub fn by_kind(&self, kind: ResolvableKind) -> impl Iterator<Item = (ItemId, &PoolItem)> {
        self.items().filter(move |(_, i)| i.kind() == kind)
    }

    /// Installed item of `kind` named `name`
    pub fn installed(&self, kind: ResolvableKind, name: &str) -> Option<ItemId> {
        self.items()
            .find(|(_, i)| i.installed && i.kind() == kind && i.name() == name)
            .map(|(id, _)| id)
    }

    /// Repository items of `kind` named `name`
    pub fn available(&self, kind: ResolvableKind, name: &str) -> Vec<ItemId> {
        self.items()
            .filter(|(_, i)| !i.installed && i.kind() == kind && i.name() == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether `a` is a better candidate than `b`: lower priority number
    /// first, then higher edition
    pub fn compare_candidates(&self, a: ItemId, b: ItemId) -> Ordering {
        let (a, b) = (&self.items[a], &self.items[b]);
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.compare_edition(b))
    }

    /// Best unlocked repository item among `candidates`
    pub fn best_of(&self, candidates: impl IntoIterator<Item = ItemId>) -> Option<ItemId> {
        candidates
            .into_iter()
            .filter(|id| !self.items[*id].locked)
            .max_by(|a, b| self.compare_candidates(*a, *b))
    }

    /// Repository items providing `capability`
    pub fn what_provides(&self, capability: &Capability) -> Vec<ItemId> {
        self.items()
            .filter(|(_, i)| i.resolvable.provides_capability(capability))
            .map(|(id, _)| id)
            .collect()
    }

    /// Items with a requirement that `capability` can satisfy
    pub fn what_requires(&self, capability: &Capability) -> Vec<ItemId> {
        self.items()
            .filter(|(_, i)| depends_on(&i.resolvable.requires, capability))
            .map(|(id, _)| id)
            .collect()
    }

    /// Items declaring a conflict with `capability`
    pub fn what_conflicts(&self, capability: &Capability) -> Vec<ItemId> {
        self.items()
            .filter(|(_, i)| depends_on(&i.resolvable.conflicts, capability))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether the installed system (plus pending installs, minus pending
    /// removals) provides `capability`
    pub fn is_satisfied(&self, capability: &Capability) -> bool {
        self.items.iter().any(|i| {
            let present = (i.installed && i.transact != Transact::Remove)
                || (!i.installed && i.transact == Transact::Install);
            present && i.resolvable.provides_capability(capability)
        })
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<ItemId> {
        let terms: Vec<String> = query.terms.iter().map(|t| t.to_lowercase()).collect();
        self.items()
            .filter(|(_, i)| query.kind.is_none_or(|k| i.kind() == k))
            .filter(|(_, i)| !(query.installed_only && !self.is_installed_name(i)))
            .filter(|(_, i)| !(query.uninstalled_only && self.is_installed_name(i)))
            .filter(|(_, i)| {
                let name = i.name().to_lowercase();
                terms.is_empty()
                    || terms.iter().any(|t| {
                        if query.match_exact {
                            name == *t
                        } else {
                            name.contains(t.as_str())
                                || i.resolvable.summary.to_lowercase().contains(t.as_str())
                        }
                    })
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn is_installed_name(&self, item: &PoolItem) -> bool {
        item.installed || self.installed(item.kind(), item.name()).is_some()
    }

    /// Mark an item for installation
    pub fn mark_install(&mut self, id: ItemId) -> Result<()> {
        let item = &mut self.items[id];
        if item.locked {
            return Err(Error::ConflictError(format!(
                "'{}' is locked and cannot be installed.",
                item.name()
            )));
        }
        item.transact = Transact::Install;
        Ok(())
    }

    /// Mark an installed item for removal
    pub fn mark_remove(&mut self, id: ItemId) -> Result<()> {
        let item = &mut self.items[id];
        if item.locked {
            return Err(Error::ConflictError(format!(
                "'{}' is locked and cannot be removed.",
                item.name()
            )));
        }
        if !item.installed {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not installed.",
                item.name()
            )));
        }
        item.transact = Transact::Remove;
        Ok(())
    }

    /// Items with a pending change
    pub fn marked(&self) -> Vec<ItemId> {
        self.items()
            .filter(|(_, i)| i.transact != Transact::Keep)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn clear_marks(&mut self) {
        for item in &mut self.items {
            item.transact = Transact::Keep;
        }
    }
}

fn depends_on(dependencies: &[String], capability: &Capability) -> bool {
    dependencies
        .iter()
        .filter_map(|d| Capability::parse(d).ok())
        .any(|d| d.overlaps(capability))
}
