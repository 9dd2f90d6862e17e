// src/repository/local.rs

//! Filesystem-backed metadata collaborator
//!
//! Raw metadata lives below the raw cache directory, one directory per
//! repository alias (`index.json` + `status.json`). The resolvable cache is
//! a SQLite database shared by all repositories. Change detection compares
//! the sha256 of the published index against the stored one.

use super::client::MediaFetcher;
use super::metadata::{
    BuildPolicy, INDEX_FILE, MetadataError, MetadataService, MetadataStatus, RefreshCheck,
    RefreshPolicy, RepositoryIndex, SERVICE_INDEX_FILE, ServiceIndex,
};
use crate::db::models::{CacheStatus, RepositoryRecord, Resolvable, ServiceRecord};
use crate::db::paths::StorePaths;
use crate::db::{self, DatabaseKind};
use chrono::Utc;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const STATUS_FILE: &str = "status.json";

/// Metadata collaborator backed by the local cache directories
pub struct LocalMetadataService {
    paths: StorePaths,
    fetcher: MediaFetcher,
    metadata_expire: Duration,
    cache: OnceCell<Connection>,
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn io_error(what: &str, path: &Path, err: std::io::Error) -> MetadataError {
    MetadataError::Other(format!("{} {}: {}", what, path.display(), err))
}

impl LocalMetadataService {
    pub fn new(paths: StorePaths, metadata_expire: Duration) -> Self {
        Self {
            paths,
            fetcher: MediaFetcher::new(),
            metadata_expire,
            cache: OnceCell::new(),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Cache database, opened on first use
    ///
    /// Unprivileged users may not be able to create it; that only matters
    /// once something actually needs the cache.
    fn cache(&self) -> Result<&Connection, MetadataError> {
        if let Some(conn) = self.cache.get() {
            return Ok(conn);
        }
        let conn = db::open(&self.paths.cache_db(), DatabaseKind::Cache)
            .map_err(|e| MetadataError::Other(format!("Cannot open the cache database: {e}")))?;
        Ok(self.cache.get_or_init(|| conn))
    }

    fn write_status(&self, alias: &str, status: &MetadataStatus) -> Result<(), MetadataError> {
        let path = self.paths.raw_dir(alias).join(STATUS_FILE);
        let json = serde_json::to_vec_pretty(status)
            .map_err(|e| MetadataError::Other(e.to_string()))?;
        write_atomic(&path, &json)
    }

    /// Record a successful check so the delay window starts again
    fn touch_status(&self, alias: &str, mut status: MetadataStatus) {
        status.checked_at = Utc::now();
        if let Err(e) = self.write_status(alias, &status) {
            debug!("Could not update status of '{}': {}", alias, e);
        }
    }

    fn within_delay(&self, status: &MetadataStatus) -> bool {
        let age = Utc::now().signed_duration_since(status.checked_at);
        age.to_std().is_ok_and(|age| age < self.metadata_expire)
    }

    /// Fetch and validate the index below one base URI
    fn fetch_index(&self, url: &Url) -> Result<(Vec<u8>, RepositoryIndex), MetadataError> {
        let bytes = self.fetcher.fetch(url, INDEX_FILE)?;
        let index: RepositoryIndex = serde_json::from_slice(&bytes).map_err(|e| {
            MetadataError::InvalidRepository(format!("{} does not hold a valid index: {}", url, e))
        })?;
        Ok((bytes, index))
    }

    fn store_raw(&self, repo: &RepositoryRecord, url: &Url, bytes: &[u8]) -> Result<(), MetadataError> {
        let dir = self.paths.raw_dir(&repo.alias);
        fs::create_dir_all(&dir).map_err(|e| io_error("Cannot create", &dir, e))?;
        write_atomic(&dir.join(INDEX_FILE), bytes)?;
        self.write_status(
            &repo.alias,
            &MetadataStatus {
                checksum: checksum(bytes),
                checked_at: Utc::now(),
                url: url.clone(),
            },
        )?;
        info!("Stored raw metadata of '{}' from {}", repo.alias, url);
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MetadataError> {
    let dir = path
        .parent()
        .ok_or_else(|| MetadataError::Other(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| io_error("Cannot create", dir, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error("Cannot write to", dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| io_error("Cannot write", tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| io_error("Cannot replace", path, e.error))?;
    Ok(())
}

fn remove_dir(path: &Path) -> Result<(), MetadataError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("Cannot remove", path, e)),
    }
}

impl MetadataService for LocalMetadataService {
    fn check_if_refresh_needed(
        &self,
        repo: &RepositoryRecord,
        url: &Url,
        policy: RefreshPolicy,
    ) -> Result<RefreshCheck, MetadataError> {
        if policy == RefreshPolicy::Forced {
            return Ok(RefreshCheck::NeedsRefresh);
        }

        let status = self.metadata_status(repo);
        if let Some(status) = &status
            && policy == RefreshPolicy::IfNeeded
            && self.within_delay(status)
        {
            return Ok(RefreshCheck::CheckDelayed);
        }

        let bytes = self.fetcher.fetch(url, INDEX_FILE)?;
        match status {
            Some(status) if status.checksum == checksum(&bytes) => {
                self.touch_status(&repo.alias, status);
                Ok(RefreshCheck::UpToDate)
            }
            _ => Ok(RefreshCheck::NeedsRefresh),
        }
    }

    fn refresh_metadata(
        &self,
        repo: &RepositoryRecord,
        policy: RefreshPolicy,
    ) -> Result<(), MetadataError> {
        if repo.alias.is_empty() {
            return Err(MetadataError::NoAlias);
        }
        if repo.base_urls.is_empty() {
            return Err(MetadataError::NoUrl);
        }

        let status = self.metadata_status(repo);
        let mut last_error = None;

        for url in &repo.base_urls {
            let (bytes, _index) = match self.fetch_index(url) {
                Ok(fetched) => fetched,
                Err(e) => {
                    debug!("Base URI {} of '{}' failed: {}", url, repo.alias, e);
                    last_error = Some(e);
                    continue;
                }
            };

            if policy != RefreshPolicy::Forced
                && let Some(status) = &status
                && status.checksum == checksum(&bytes)
            {
                self.touch_status(&repo.alias, status.clone());
                return Ok(());
            }

            return self.store_raw(repo, url, &bytes);
        }

        Err(last_error.unwrap_or(MetadataError::NoUrl))
    }

    fn build_cache(&self, repo: &RepositoryRecord, policy: BuildPolicy) -> Result<(), MetadataError> {
        let status = self.metadata_status(repo).ok_or(MetadataError::NotCached)?;
        let conn = self.cache()?;

        let built = CacheStatus::find(conn, &repo.alias).map_err(|e| MetadataError::Other(e.to_string()))?;
        if policy == BuildPolicy::IfNeeded
            && built.is_some_and(|b| b.checksum == status.checksum)
        {
            debug!("Cache of '{}' is current", repo.alias);
            return Ok(());
        }

        let raw_path = self.paths.raw_dir(&repo.alias).join(INDEX_FILE);
        let bytes = fs::read(&raw_path).map_err(|_| MetadataError::NotCached)?;
        let index: RepositoryIndex = serde_json::from_slice(&bytes).map_err(|e| {
            MetadataError::Parse(format!("{}: {}", raw_path.display(), e))
        })?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| MetadataError::Other(e.to_string()))?;
        let result: crate::Result<()> = (|| {
            Resolvable::delete_cached(&tx, &repo.alias)?;
            for resolvable in &index.resolvables {
                resolvable.insert_cached(&tx, &repo.alias)?;
            }
            CacheStatus {
                repo_alias: repo.alias.clone(),
                checksum: status.checksum.clone(),
                built_at: Utc::now().to_rfc3339(),
            }
            .save(&tx)?;
            Ok(())
        })();
        result.map_err(|e| MetadataError::Other(e.to_string()))?;
        tx.commit().map_err(|e| MetadataError::Other(e.to_string()))?;

        info!(
            "Built cache of '{}' with {} resolvables",
            repo.alias,
            index.resolvables.len()
        );
        Ok(())
    }

    fn metadata_status(&self, repo: &RepositoryRecord) -> Option<MetadataStatus> {
        let path = self.paths.raw_dir(&repo.alias).join(STATUS_FILE);
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn is_cached(&self, repo: &RepositoryRecord) -> bool {
        self.cache()
            .ok()
            .and_then(|conn| CacheStatus::find(conn, &repo.alias).ok().flatten())
            .is_some()
    }

    fn load_from_cache(&self, repo: &RepositoryRecord) -> Result<Vec<Resolvable>, MetadataError> {
        if !self.is_cached(repo) {
            return Err(MetadataError::NotCached);
        }
        Resolvable::list_cached(self.cache()?, &repo.alias)
            .map_err(|e| MetadataError::Other(e.to_string()))
    }

    fn clean_cache(&self, repo: &RepositoryRecord) -> Result<(), MetadataError> {
        let conn = self.cache()?;
        Resolvable::delete_cached(conn, &repo.alias)
            .and_then(|_| CacheStatus::delete(conn, &repo.alias))
            .map_err(|e| MetadataError::Other(e.to_string()))
    }

    fn clean_raw_metadata(&self, repo: &RepositoryRecord) -> Result<(), MetadataError> {
        remove_dir(&self.paths.raw_dir(&repo.alias))
    }

    fn clean_packages(&self, repo: &RepositoryRecord) -> Result<(), MetadataError> {
        remove_dir(&self.paths.packages_dir(&repo.alias))
    }

    fn refresh_service(&self, service: &ServiceRecord) -> Result<Vec<RepositoryRecord>, MetadataError> {
        let bytes = self.fetcher.fetch(&service.url, SERVICE_INDEX_FILE)?;
        let index: ServiceIndex = serde_json::from_slice(&bytes).map_err(|e| {
            MetadataError::InvalidRepository(format!(
                "{} does not hold a valid service index: {}",
                service.url, e
            ))
        })?;
        Ok(index
            .repositories
            .into_iter()
            .map(|r| r.into_record(&service.alias))
            .collect())
    }
}
