// src/resolvable/solver.rs

//! Solver collaborator
//!
//! `status` computes what the current pool says about the system
//! (available updates, needed patches). `resolve` turns the marks set by a
//! command into a complete change set, pulling in missing requirements and
//! dependent removals. `commit` hands the change set to the target.

use super::{ItemId, ResolvablePool, Transact};
use crate::db::models::{Resolvable, ResolvableKind};
use crate::error::{Error, Result};
use crate::resolvable::target::Target;
use crate::version::Capability;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// One change to the installed system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Install(Resolvable),
    Remove(Resolvable),
}

impl Change {
    pub fn resolvable(&self) -> &Resolvable {
        match self {
            Change::Install(r) | Change::Remove(r) => r,
        }
    }
}

/// An installed item and a newer candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub installed: ItemId,
    pub candidate: ItemId,
}

/// State of the system as seen through the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStatus {
    pub updates: Vec<Update>,
    pub needed_patches: Vec<ItemId>,
}

impl SystemStatus {
    pub fn security_patches(&self, pool: &ResolvablePool) -> usize {
        self.needed_patches
            .iter()
            .filter(|id| pool.item(**id).resolvable.is_security_patch())
            .count()
    }
}

/// Complete change set for the current marks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub changes: Vec<Change>,
    /// Requirements nobody provides
    pub problems: Vec<String>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn installs(&self) -> impl Iterator<Item = &Resolvable> {
        self.changes.iter().filter_map(|c| match c {
            Change::Install(r) => Some(r),
            Change::Remove(_) => None,
        })
    }

    pub fn removals(&self) -> impl Iterator<Item = &Resolvable> {
        self.changes.iter().filter_map(|c| match c {
            Change::Remove(r) => Some(r),
            Change::Install(_) => None,
        })
    }
}

/// Solver collaborator
pub trait Solver {
    fn status(&self, pool: &ResolvablePool) -> SystemStatus;

    /// Complete the marks in `pool` into a change set
    fn resolve(&self, pool: &mut ResolvablePool) -> Result<Resolution>;

    fn commit(&self, resolution: &Resolution, target: &mut dyn Target) -> Result<()>;
}

/// Greedy solver: best candidate by repository priority, then edition
#[derive(Debug, Default)]
pub struct SimpleSolver;

fn requirements(resolvable: &Resolvable) -> impl Iterator<Item = Capability> + '_ {
    resolvable
        .requires
        .iter()
        .filter_map(|r| Capability::parse(r).ok())
}

impl SimpleSolver {
    /// Whether a repository patch applies and is not yet satisfied
    ///
    /// A patch is needed when some package it requires is installed in an
    /// edition that does not satisfy the requirement.
    fn patch_needed(pool: &ResolvablePool, patch: &Resolvable) -> bool {
        if pool.installed(ResolvableKind::Patch, &patch.name).is_some() {
            return false;
        }
        requirements(patch).any(|cap| {
            pool.installed(ResolvableKind::Package, &cap.name)
                .is_some_and(|id| !pool.item(id).resolvable.provides_capability(&cap))
        })
    }

    fn pull_requirements(
        pool: &mut ResolvablePool,
        start: Vec<ItemId>,
        problems: &mut Vec<String>,
    ) {
        let mut queue: VecDeque<ItemId> = start.into();
        while let Some(id) = queue.pop_front() {
            let item = pool.item(id).resolvable.clone();
            for cap in requirements(&item) {
                if pool.is_satisfied(&cap) {
                    continue;
                }
                let candidates: Vec<ItemId> = pool
                    .what_provides(&cap)
                    .into_iter()
                    .filter(|c| !pool.item(*c).installed)
                    .collect();
                match pool.best_of(candidates) {
                    Some(provider) => {
                        debug!("'{}' pulled in by '{}' for {}", pool.item(provider).name(), item.name, cap);
                        if pool.mark_install(provider).is_ok() {
                            queue.push_back(provider);
                        }
                    }
                    None => problems.push(format!(
                        "nothing provides '{}' needed by '{}'",
                        cap,
                        item.ident()
                    )),
                }
            }
        }
    }

    /// Installed items whose requirements break once the marked removals happen
    fn pull_dependents(pool: &mut ResolvablePool) {
        loop {
            let broken: Vec<ItemId> = pool
                .items()
                .filter(|(_, i)| i.installed && i.transact == Transact::Keep)
                .filter(|(_, i)| requirements(&i.resolvable).any(|cap| !pool.is_satisfied(&cap)))
                .filter(|(_, i)| !i.locked)
                .map(|(id, _)| id)
                .collect();
            if broken.is_empty() {
                return;
            }
            for id in broken {
                debug!("'{}' removed with its requirements", pool.item(id).name());
                let _ = pool.mark_remove(id);
            }
        }
    }
}

impl Solver for SimpleSolver {
    fn status(&self, pool: &ResolvablePool) -> SystemStatus {
        let mut status = SystemStatus::default();

        for (id, item) in pool.items() {
            if item.installed && item.kind() == ResolvableKind::Package && !item.locked {
                let newer: Vec<ItemId> = pool
                    .available(item.kind(), item.name())
                    .into_iter()
                    .filter(|c| pool.item(*c).resolvable.edition != item.resolvable.edition)
                    .collect();
                if let Some(candidate) = pool.best_of(newer)
                    && pool.item(candidate).resolvable.parsed_edition().ok()
                        > item.resolvable.parsed_edition().ok()
                {
                    status.updates.push(Update {
                        installed: id,
                        candidate,
                    });
                }
            }

            if !item.installed
                && item.kind() == ResolvableKind::Patch
                && Self::patch_needed(pool, &item.resolvable)
            {
                status.needed_patches.push(id);
            }
        }

        status
    }

    fn resolve(&self, pool: &mut ResolvablePool) -> Result<Resolution> {
        let mut problems = Vec::new();

        let installs: Vec<ItemId> = pool
            .marked()
            .into_iter()
            .filter(|id| pool.item(*id).transact == Transact::Install)
            .collect();
        Self::pull_requirements(pool, installs, &mut problems);
        Self::pull_dependents(pool);

        let mut seen = BTreeSet::new();
        let mut changes = Vec::new();
        for id in pool.marked() {
            let item = pool.item(id);
            // one change per kind and name
            if !seen.insert((item.kind().as_str(), item.name().to_string(), item.transact == Transact::Install)) {
                continue;
            }
            changes.push(match item.transact {
                Transact::Install => Change::Install(item.resolvable.clone()),
                _ => Change::Remove(item.resolvable.clone()),
            });
        }

        // replacing an installed item is an install, not a removal
        let replaced: Vec<(ResolvableKind, String)> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Install(r) => Some((r.kind, r.name.clone())),
                Change::Remove(_) => None,
            })
            .collect();
        changes.retain(|c| match c {
            Change::Remove(r) => !replaced.contains(&(r.kind, r.name.clone())),
            Change::Install(_) => true,
        });

        Ok(Resolution { changes, problems })
    }

    fn commit(&self, resolution: &Resolution, target: &mut dyn Target) -> Result<()> {
        if !resolution.problems.is_empty() {
            return Err(Error::ConflictError(format!(
                "Dependency problems remain: {}",
                resolution.problems.join("; ")
            )));
        }
        if resolution.is_empty() {
            return Ok(());
        }
        target.commit(&resolution.changes)
    }
}
