// src/repository/fake.rs

//! Scripted metadata collaborator for unit tests

use super::metadata::{
    BuildPolicy, MetadataError, MetadataService, MetadataStatus, RefreshCheck, RefreshPolicy,
};
use crate::db::models::{RepositoryRecord, Resolvable, ServiceRecord};
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Answers from scripts (consumed in order) or per-alias failures,
/// counting every call
#[derive(Default)]
pub struct FakeMetadata {
    pub check: RefCell<Vec<Result<RefreshCheck, MetadataError>>>,
    pub refresh: RefCell<Vec<Result<(), MetadataError>>>,
    pub build: RefCell<Vec<Result<(), MetadataError>>>,
    pub refresh_failures: RefCell<HashMap<String, MetadataError>>,
    pub build_failures: RefCell<HashMap<String, MetadataError>>,
    pub resolvables: RefCell<HashMap<String, Vec<Resolvable>>>,
    pub fetched: RefCell<HashSet<String>>,
    pub cached: RefCell<HashSet<String>>,
    /// Report every repository as cached, whatever was built
    pub claim_cached: Cell<bool>,
    pub checks: Cell<usize>,
    pub fetches: Cell<usize>,
    pub builds: Cell<usize>,
    pub loads: Cell<usize>,
}

fn pop<T>(script: &RefCell<Vec<T>>) -> Option<T> {
    let mut script = script.borrow_mut();
    if script.is_empty() {
        None
    } else {
        Some(script.remove(0))
    }
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_refresh(&self, alias: &str, err: MetadataError) {
        self.refresh_failures.borrow_mut().insert(alias.to_string(), err);
    }

    pub fn fail_build(&self, alias: &str, err: MetadataError) {
        self.build_failures.borrow_mut().insert(alias.to_string(), err);
    }

    pub fn publish(&self, alias: &str, resolvables: Vec<Resolvable>) {
        self.resolvables.borrow_mut().insert(alias.to_string(), resolvables);
    }

    /// Pretend raw metadata and cache exist already
    pub fn prime(&self, alias: &str) {
        self.fetched.borrow_mut().insert(alias.to_string());
        self.cached.borrow_mut().insert(alias.to_string());
    }
}

impl MetadataService for FakeMetadata {
    fn check_if_refresh_needed(
        &self,
        _repo: &RepositoryRecord,
        _url: &Url,
        _policy: RefreshPolicy,
    ) -> Result<RefreshCheck, MetadataError> {
        self.checks.set(self.checks.get() + 1);
        pop(&self.check).unwrap_or(Ok(RefreshCheck::NeedsRefresh))
    }

    fn refresh_metadata(
        &self,
        repo: &RepositoryRecord,
        _policy: RefreshPolicy,
    ) -> Result<(), MetadataError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(err) = self.refresh_failures.borrow().get(&repo.alias) {
            return Err(err.clone());
        }
        let result = pop(&self.refresh).unwrap_or(Ok(()));
        if result.is_ok() {
            self.fetched.borrow_mut().insert(repo.alias.clone());
        }
        result
    }

    fn build_cache(
        &self,
        repo: &RepositoryRecord,
        _policy: BuildPolicy,
    ) -> Result<(), MetadataError> {
        self.builds.set(self.builds.get() + 1);
        if let Some(err) = self.build_failures.borrow().get(&repo.alias) {
            return Err(err.clone());
        }
        let result = pop(&self.build).unwrap_or(Ok(()));
        if result.is_ok() {
            self.cached.borrow_mut().insert(repo.alias.clone());
        }
        result
    }

    fn metadata_status(&self, repo: &RepositoryRecord) -> Option<MetadataStatus> {
        if !self.fetched.borrow().contains(&repo.alias) {
            return None;
        }
        Some(MetadataStatus {
            checksum: "0".repeat(64),
            checked_at: Utc::now(),
            url: repo.base_urls.first()?.clone(),
        })
    }

    fn is_cached(&self, repo: &RepositoryRecord) -> bool {
        self.claim_cached.get() || self.cached.borrow().contains(&repo.alias)
    }

    fn load_from_cache(&self, repo: &RepositoryRecord) -> Result<Vec<Resolvable>, MetadataError> {
        self.loads.set(self.loads.get() + 1);
        if !self.cached.borrow().contains(&repo.alias) {
            return Err(MetadataError::NotCached);
        }
        let mut resolvables = self
            .resolvables
            .borrow()
            .get(&repo.alias)
            .cloned()
            .unwrap_or_default();
        for r in &mut resolvables {
            r.repo_alias = Some(repo.alias.clone());
        }
        Ok(resolvables)
    }

    fn clean_cache(&self, repo: &RepositoryRecord) -> Result<(), MetadataError> {
        self.cached.borrow_mut().remove(&repo.alias);
        Ok(())
    }

    fn clean_raw_metadata(&self, repo: &RepositoryRecord) -> Result<(), MetadataError> {
        self.fetched.borrow_mut().remove(&repo.alias);
        Ok(())
    }

    fn clean_packages(&self, _repo: &RepositoryRecord) -> Result<(), MetadataError> {
        Ok(())
    }

    fn refresh_service(
        &self,
        _service: &ServiceRecord,
    ) -> Result<Vec<RepositoryRecord>, MetadataError> {
        Ok(Vec::new())
    }
}
