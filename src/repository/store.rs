// src/repository/store.rs

//! Repository store collaborator
//!
//! Persistent set of repository and service definitions. Enumeration order
//! is stable (by alias) and is what numeric selectors resolve against.

use super::client::MediaFetcher;
use super::init::PLUS_REPO_PREFIX;
use super::metadata::{INDEX_FILE, RepositoryIndex};
use crate::db::models::{RepoType, RepositoryRecord, ServiceRecord};
use crate::db::{self, DatabaseKind};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Repository-store collaborator
pub trait RepoStore {
    /// All repositories in enumeration order
    fn repositories(&self) -> Result<Vec<RepositoryRecord>>;

    fn repository(&self, alias: &str) -> Result<Option<RepositoryRecord>>;

    /// Add a repository; the alias must be unused
    fn add_repository(&self, repo: &RepositoryRecord) -> Result<()>;

    fn remove_repository(&self, alias: &str) -> Result<()>;

    /// Change the alias of a repository; the new alias must be unused
    fn rename_repository(&self, alias: &str, new_alias: &str) -> Result<()>;

    /// Replace the stored definition of `alias` with `repo`
    fn modify_repository(&self, alias: &str, repo: &RepositoryRecord) -> Result<()>;

    /// Detect the metadata format published at `url`
    fn probe_type(&self, url: &Url) -> Result<RepoType>;

    /// All services in enumeration order
    fn services(&self) -> Result<Vec<ServiceRecord>>;

    fn add_service(&self, service: &ServiceRecord) -> Result<()>;

    /// Remove a service and every repository it manages
    fn remove_service(&self, alias: &str) -> Result<()>;
}

fn is_temporary(alias: &str) -> bool {
    alias.starts_with(PLUS_REPO_PREFIX)
}

/// SQLite-backed repository store
pub struct SqliteRepoStore {
    conn: Connection,
    fetcher: MediaFetcher,
    /// Store file that could not be created; the store lives in memory
    /// and only accepts temporary repositories
    unwritable: Option<PathBuf>,
}

impl SqliteRepoStore {
    /// Open (creating if needed) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open(path, DatabaseKind::Repositories)?;
        Ok(Self {
            conn,
            fetcher: MediaFetcher::new(),
            unwritable: None,
        })
    }

    /// Open the store at `path`, or an empty one if it does not exist yet
    /// and cannot be created
    ///
    /// An unprivileged user on a fresh system gets an empty store. Changes
    /// other than temporary repositories then fail.
    pub fn open_or_empty(path: &Path) -> Result<Self> {
        match Self::open(path) {
            Ok(store) => Ok(store),
            Err(e) if !path.exists() => {
                warn!("Using an empty repository store: {}", e);
                let mut store = Self::in_memory()?;
                store.unwritable = Some(path.to_path_buf());
                Ok(store)
            }
            Err(e) => Err(e),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_in_memory(DatabaseKind::Repositories)?,
            fetcher: MediaFetcher::new(),
            unwritable: None,
        })
    }

    /// Fail unless the change can be stored; temporary repositories only
    /// need to live as long as the process
    fn ensure_writable(&self, temporary: bool) -> Result<()> {
        match &self.unwritable {
            Some(path) if !temporary => Err(Error::InitError(format!(
                "Repository store {} cannot be created.",
                path.display()
            ))),
            _ => Ok(()),
        }
    }

    fn require(&self, alias: &str) -> Result<RepositoryRecord> {
        RepositoryRecord::find_by_alias(&self.conn, alias)?
            .ok_or_else(|| Error::NotFoundError(format!("Repository '{}' not found.", alias)))
    }

    fn ensure_unused(&self, alias: &str) -> Result<()> {
        if RepositoryRecord::find_by_alias(&self.conn, alias)?.is_some() {
            return Err(Error::ConflictError(format!(
                "Repository named '{}' already exists. Please use another alias.",
                alias
            )));
        }
        Ok(())
    }
}

impl RepoStore for SqliteRepoStore {
    fn repositories(&self) -> Result<Vec<RepositoryRecord>> {
        RepositoryRecord::list_all(&self.conn)
    }

    fn repository(&self, alias: &str) -> Result<Option<RepositoryRecord>> {
        RepositoryRecord::find_by_alias(&self.conn, alias)
    }

    fn add_repository(&self, repo: &RepositoryRecord) -> Result<()> {
        if repo.alias.is_empty() {
            return Err(Error::InvalidArgument(
                "No alias defined for this repository.".to_string(),
            ));
        }
        self.ensure_writable(is_temporary(&repo.alias))?;
        self.ensure_unused(&repo.alias)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut record = repo.clone();
        record.id = None;
        record.insert(&tx)?;
        tx.commit()?;

        info!("Added repository '{}'", repo.alias);
        Ok(())
    }

    fn remove_repository(&self, alias: &str) -> Result<()> {
        self.ensure_writable(is_temporary(alias))?;
        if !RepositoryRecord::delete(&self.conn, alias)? {
            return Err(Error::NotFoundError(format!("Repository '{}' not found.", alias)));
        }
        info!("Removed repository '{}'", alias);
        Ok(())
    }

    fn rename_repository(&self, alias: &str, new_alias: &str) -> Result<()> {
        self.ensure_writable(false)?;
        let mut repo = self.require(alias)?;
        if alias == new_alias {
            return Ok(());
        }
        self.ensure_unused(new_alias)?;

        repo.alias = new_alias.to_string();
        repo.update(&self.conn)?;
        info!("Renamed repository '{}' to '{}'", alias, new_alias);
        Ok(())
    }

    fn modify_repository(&self, alias: &str, repo: &RepositoryRecord) -> Result<()> {
        self.ensure_writable(is_temporary(&repo.alias))?;
        let existing = self.require(alias)?;
        if repo.alias != alias {
            self.ensure_unused(&repo.alias)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut record = repo.clone();
        record.id = existing.id;
        record.update(&tx)?;
        tx.commit()?;

        debug!("Modified repository '{}'", alias);
        Ok(())
    }

    fn probe_type(&self, url: &Url) -> Result<RepoType> {
        let bytes = self.fetcher.fetch(url, INDEX_FILE).map_err(|e| {
            Error::DownloadError(format!("Problem transferring repository data from '{}': {}", url, e))
        })?;
        let index: RepositoryIndex = serde_json::from_slice(&bytes).map_err(|_| {
            Error::RepositoryError(format!("No valid repository found at '{}'.", url))
        })?;

        // An index without a type tag is plain rpm-md
        Ok(match index.repo_type {
            RepoType::Unknown => RepoType::RpmMd,
            known => known,
        })
    }

    fn services(&self) -> Result<Vec<ServiceRecord>> {
        ServiceRecord::list_all(&self.conn)
    }

    fn add_service(&self, service: &ServiceRecord) -> Result<()> {
        self.ensure_writable(false)?;
        if ServiceRecord::find_by_alias(&self.conn, &service.alias)?.is_some() {
            return Err(Error::ConflictError(format!(
                "Service named '{}' already exists. Please use another alias.",
                service.alias
            )));
        }
        let mut record = service.clone();
        record.id = None;
        record.insert(&self.conn)?;
        info!("Added service '{}'", service.alias);
        Ok(())
    }

    fn remove_service(&self, alias: &str) -> Result<()> {
        self.ensure_writable(false)?;
        let tx = self.conn.unchecked_transaction()?;
        for repo in RepositoryRecord::list_by_service(&tx, alias)? {
            RepositoryRecord::delete(&tx, &repo.alias)?;
        }
        if !ServiceRecord::delete(&tx, alias)? {
            return Err(Error::NotFoundError(format!("Service '{}' not found.", alias)));
        }
        tx.commit()?;
        info!("Removed service '{}'", alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_add_and_conflict() {
        let store = SqliteRepoStore::in_memory().unwrap();
        store
            .add_repository(&RepositoryRecord::new("oss", vec![url("http://a.example.com/")]))
            .unwrap();

        let err = store
            .add_repository(&RepositoryRecord::new("oss", vec![url("http://b.example.com/")]))
            .unwrap_err();
        assert!(matches!(err, Error::ConflictError(_)));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(store.repositories().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let store = SqliteRepoStore::in_memory().unwrap();
        assert!(matches!(
            store.remove_repository("ghost"),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_rename() {
        let store = SqliteRepoStore::in_memory().unwrap();
        store
            .add_repository(&RepositoryRecord::new("a", vec![url("http://a.example.com/")]))
            .unwrap();
        store
            .add_repository(&RepositoryRecord::new("b", vec![url("http://b.example.com/")]))
            .unwrap();

        assert!(matches!(
            store.rename_repository("a", "b"),
            Err(Error::ConflictError(_))
        ));
        store.rename_repository("a", "c").unwrap();
        assert!(store.repository("a").unwrap().is_none());
        assert_eq!(
            store.repository("c").unwrap().unwrap().base_urls,
            vec![url("http://a.example.com/")]
        );
    }

    #[test]
    fn test_modify() {
        let store = SqliteRepoStore::in_memory().unwrap();
        store
            .add_repository(&RepositoryRecord::new("a", vec![url("http://a.example.com/")]))
            .unwrap();

        let mut repo = store.repository("a").unwrap().unwrap();
        repo.enabled = false;
        repo.priority = 5;
        store.modify_repository("a", &repo).unwrap();

        let stored = store.repository("a").unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.priority, 5);
    }

    #[test]
    fn test_remove_service_removes_its_repositories() {
        let store = SqliteRepoStore::in_memory().unwrap();
        store
            .add_service(&ServiceRecord::new("svc", url("http://svc.example.com/")))
            .unwrap();

        let mut owned = RepositoryRecord::new("owned", vec![url("http://a.example.com/")]);
        owned.service = Some("svc".to_string());
        store.add_repository(&owned).unwrap();
        store
            .add_repository(&RepositoryRecord::new("own", vec![url("http://b.example.com/")]))
            .unwrap();

        store.remove_service("svc").unwrap();
        let left: Vec<_> = store.repositories().unwrap().into_iter().map(|r| r.alias).collect();
        assert_eq!(left, vec!["own"]);
        assert!(matches!(store.remove_service("svc"), Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_probe_type() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), r#"{"type": "yast2"}"#).unwrap();
        let store = SqliteRepoStore::in_memory().unwrap();

        let base = Url::from_directory_path(dir.path()).unwrap();
        assert_eq!(store.probe_type(&base).unwrap(), RepoType::Yast2);

        let missing = Url::from_directory_path(dir.path().join("none")).unwrap();
        assert!(matches!(store.probe_type(&missing), Err(Error::DownloadError(_))));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repos.d/repos.db");
        {
            let store = SqliteRepoStore::open(&path).unwrap();
            store
                .add_repository(&RepositoryRecord::new("oss", vec![url("http://a.example.com/")]))
                .unwrap();
        }
        let reopened = SqliteRepoStore::open(&path).unwrap();
        assert!(reopened.repository("oss").unwrap().is_some());
    }

    #[test]
    fn test_uncreatable_store_is_empty() {
        let dir = tempdir().unwrap();
        // a plain file where the directory should go
        let blocker = dir.path().join("etc");
        std::fs::write(&blocker, "").unwrap();

        let store = SqliteRepoStore::open_or_empty(&blocker.join("repos.d/repos.db")).unwrap();
        assert!(store.repositories().unwrap().is_empty());

        let err = store
            .add_repository(&RepositoryRecord::new("oss", vec![url("http://a.example.com/")]))
            .unwrap_err();
        assert!(matches!(err, Error::InitError(_)));

        store
            .add_repository(&RepositoryRecord::new("tmp1", vec![url("http://b.example.com/")]))
            .unwrap();
        store.remove_repository("tmp1").unwrap();
    }
}
