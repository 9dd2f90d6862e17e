// src/repository/management.rs

//! Repository and service management operations
//!
//! Functions for adding, renaming, modifying and exporting repository
//! definitions, selecting repositories by medium, and syncing the
//! repositories published by services.

use super::metadata::MetadataService;
use super::store::RepoStore;
use crate::db::models::{DEFAULT_PRIORITY, RepoType, RepositoryRecord, ServiceRecord};
use crate::error::{Error, Result};
use crate::output::Output;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Options of the add-repository workflow
#[derive(Debug, Clone)]
pub struct AddRepoOptions {
    pub url: Url,
    /// Defaults to a timestamp
    pub alias: Option<String>,
    pub name: Option<String>,
    pub repo_type: Option<RepoType>,
    pub enabled: Option<bool>,
    pub autorefresh: Option<bool>,
    pub keep_packages: Option<bool>,
    pub priority: Option<u32>,
    /// Probe the medium for its metadata format
    pub check: bool,
}

impl AddRepoOptions {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            alias: None,
            name: None,
            repo_type: None,
            enabled: None,
            autorefresh: None,
            keep_packages: None,
            priority: None,
            check: true,
        }
    }
}

/// Alias given to repositories added without one
pub fn timestamp_alias() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

fn validate_priority(priority: u32) -> Result<u32> {
    if priority == 0 {
        return Err(Error::InvalidArgument(format!(
            "Invalid priority '{}'. Use a positive integer number. The greater the number, the lower the priority.",
            priority
        )));
    }
    Ok(priority)
}

/// Add a repository to the store
pub fn add_repository(
    store: &dyn RepoStore,
    out: &Output,
    options: AddRepoOptions,
) -> Result<RepositoryRecord> {
    let alias = options.alias.unwrap_or_else(timestamp_alias);
    let mut repo = RepositoryRecord::new(alias, vec![options.url]);
    if let Some(name) = options.name {
        repo.name = name;
    }
    repo.enabled = options.enabled.unwrap_or(true);
    repo.keep_packages = options.keep_packages.unwrap_or(false);
    repo.priority = validate_priority(options.priority.unwrap_or(DEFAULT_PRIORITY))?;

    // Refreshing optical media on every run would keep asking for the disc
    repo.autorefresh = if repo.is_changeable_media() {
        if options.autorefresh == Some(true) {
            out.warning("Autorefresh is not supported for repositories on changeable media and was turned off.");
        }
        false
    } else {
        options.autorefresh.unwrap_or(false)
    };

    repo.repo_type = match options.repo_type {
        Some(repo_type) => repo_type,
        None if options.check && !repo.is_changeable_media() => {
            store.probe_type(&repo.base_urls[0])?
        }
        None => RepoType::Unknown,
    };

    store.add_repository(&repo)?;
    info!("Added repository '{}' ({})", repo.alias, repo.base_urls[0]);
    Ok(repo)
}

/// One entry of a repository definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFileEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub baseurl: Vec<Url>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub autorefresh: bool,
    #[serde(default)]
    pub keep_packages: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, rename = "type")]
    pub repo_type: RepoType,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl RepoFileEntry {
    fn into_record(self, alias: String, file: &Path) -> RepositoryRecord {
        let mut repo = RepositoryRecord::new(alias, self.baseurl);
        repo.name = self.name;
        repo.enabled = self.enabled;
        repo.autorefresh = self.autorefresh;
        repo.keep_packages = self.keep_packages;
        repo.priority = self.priority;
        repo.repo_type = self.repo_type;
        repo.file_path = Some(file.to_path_buf());
        repo
    }
}

impl From<&RepositoryRecord> for RepoFileEntry {
    fn from(repo: &RepositoryRecord) -> Self {
        Self {
            name: repo.name.clone(),
            baseurl: repo.base_urls.clone(),
            enabled: repo.enabled,
            autorefresh: repo.autorefresh,
            keep_packages: repo.keep_packages,
            priority: repo.priority,
            repo_type: repo.repo_type,
        }
    }
}

/// Parse a repository definition file (TOML, one table per alias)
///
/// ```toml
/// [oss]
/// name = "Main Repository"
/// baseurl = ["https://download.example.com/oss/"]
/// autorefresh = true
/// ```
pub fn read_repo_file(path: &Path) -> Result<Vec<RepositoryRecord>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Cannot read {}: {}", path.display(), e)))?;
    let entries: BTreeMap<String, RepoFileEntry> = toml::from_str(&content).map_err(|e| {
        Error::ParseError(format!("Invalid repository file {}: {}", path.display(), e))
    })?;

    if entries.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "Can't find a valid repository at given location: {}",
            path.display()
        )));
    }

    Ok(entries
        .into_iter()
        .map(|(alias, entry)| entry.into_record(alias, path))
        .collect())
}

/// Add every repository defined in a file
///
/// Entries are added independently; a failing entry does not stop the rest.
pub fn add_repositories_from_file(
    store: &dyn RepoStore,
    path: &Path,
) -> Result<Vec<(String, Result<RepositoryRecord>)>> {
    let mut results = Vec::new();
    for repo in read_repo_file(path)? {
        let alias = repo.alias.clone();
        let result = if repo.base_urls.is_empty() {
            Err(Error::InvalidArgument(format!(
                "Repository '{}' has no URI defined in {}.",
                alias,
                path.display()
            )))
        } else {
            validate_priority(repo.priority)
                .and_then(|_| store.add_repository(&repo))
                .map(|_| repo)
        };
        results.push((alias, result));
    }
    Ok(results)
}

/// Serialize repositories in the definition file format
pub fn export_repositories(repos: &[RepositoryRecord]) -> Result<String> {
    let entries: BTreeMap<String, RepoFileEntry> = repos
        .iter()
        .map(|r| (r.alias.clone(), RepoFileEntry::from(r)))
        .collect();
    toml::to_string_pretty(&entries)
        .map_err(|e| Error::ParseError(format!("Cannot export repositories: {}", e)))
}

/// Collapse an on/off flag pair into a tri-state
///
/// Both flags at once contradict each other; the value is left unchanged.
pub fn tri_state(out: &Output, on: bool, off: bool, on_flag: &str, off_flag: &str) -> Option<bool> {
    match (on, off) {
        (true, true) => {
            out.warning(format!(
                "Contradicting options '{}' and '{}' specified. The setting is left unchanged.",
                on_flag, off_flag
            ));
            None
        }
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Requested changes to a repository; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoChanges {
    pub enabled: Option<bool>,
    pub autorefresh: Option<bool>,
    pub keep_packages: Option<bool>,
    pub priority: Option<u32>,
    pub name: Option<String>,
}

impl RepoChanges {
    pub fn is_empty(&self) -> bool {
        *self == RepoChanges::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        Ok(())
    }

    /// Apply to `repo`, returning whether anything changed
    pub fn apply(&self, repo: &mut RepositoryRecord) -> bool {
        let before = repo.clone();
        if let Some(enabled) = self.enabled {
            repo.enabled = enabled;
        }
        if let Some(autorefresh) = self.autorefresh {
            repo.autorefresh = autorefresh;
        }
        if let Some(keep) = self.keep_packages {
            repo.keep_packages = keep;
        }
        if let Some(priority) = self.priority {
            repo.priority = priority;
        }
        if let Some(name) = &self.name {
            repo.name = name.clone();
        }
        *repo != before
    }
}

/// Apply `changes` to one repository; `false` if nothing changed
pub fn modify_repository(
    store: &dyn RepoStore,
    out: &Output,
    repo: &RepositoryRecord,
    changes: &RepoChanges,
) -> Result<bool> {
    changes.validate()?;

    let mut updated = repo.clone();
    if !changes.apply(&mut updated) {
        out.info(format!(
            "Nothing to change for repository '{}'.",
            repo.display_name()
        ));
        return Ok(false);
    }

    store.modify_repository(&repo.alias, &updated)?;
    info!("Repository '{}' modified", repo.alias);
    Ok(true)
}

/// Selection of repositories by medium instead of by selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoFilter {
    pub all: bool,
    pub local: bool,
    pub remote: bool,
    /// URI schemes (`http`, `cd`, ...)
    pub medium_types: Vec<String>,
}

impl RepoFilter {
    pub fn is_empty(&self) -> bool {
        !self.all && !self.local && !self.remote && self.medium_types.is_empty()
    }

    pub fn matches(&self, repo: &RepositoryRecord) -> bool {
        if self.all {
            return true;
        }
        let scheme_matches = repo.base_urls.first().is_some_and(|u| {
            self.medium_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(u.scheme()))
        });
        (self.local && repo.is_local()) || (self.remote && !repo.is_local()) || scheme_matches
    }

    pub fn select(&self, repos: &[RepositoryRecord]) -> Vec<RepositoryRecord> {
        repos.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Add a service to the store
pub fn add_service(
    store: &dyn RepoStore,
    url: Url,
    alias: Option<String>,
    name: Option<String>,
) -> Result<ServiceRecord> {
    let mut service = ServiceRecord::new(alias.unwrap_or_else(timestamp_alias), url);
    if let Some(name) = name {
        service.name = name;
    }
    store.add_service(&service)?;
    Ok(service)
}

/// Changes made by syncing one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSync {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

/// Bring the repositories of `service` in line with what it publishes
pub fn refresh_service(
    store: &dyn RepoStore,
    metadata: &dyn MetadataService,
    service: &ServiceRecord,
) -> Result<ServiceSync> {
    let published = metadata.refresh_service(service).map_err(|e| {
        Error::RepositoryError(format!(
            "Problem retrieving the repository index file for service '{}': {}",
            service.display_name(),
            e
        ))
    })?;

    let existing: Vec<RepositoryRecord> = store
        .repositories()?
        .into_iter()
        .filter(|r| r.service.as_deref() == Some(service.alias.as_str()))
        .collect();

    let mut sync = ServiceSync::default();
    for repo in &published {
        match existing.iter().find(|e| e.alias == repo.alias) {
            Some(current) => {
                let mut updated = repo.clone();
                updated.id = current.id;
                updated.file_path = current.file_path.clone();
                if updated != *current {
                    store.modify_repository(&current.alias, &updated)?;
                    sync.updated.push(repo.alias.clone());
                }
            }
            None => {
                store.add_repository(repo)?;
                sync.added.push(repo.alias.clone());
            }
        }
    }

    for stale in existing
        .iter()
        .filter(|e| !published.iter().any(|p| p.alias == e.alias))
    {
        store.remove_repository(&stale.alias)?;
        sync.removed.push(stale.alias.clone());
    }

    debug!(
        "Service '{}': {} added, {} updated, {} removed",
        service.alias,
        sync.added.len(),
        sync.updated.len(),
        sync.removed.len()
    );
    Ok(sync)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MessageKind, Verbosity};
    use crate::repository::store::SqliteRepoStore;
    use tempfile::tempdir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn unchecked(u: &str, alias: &str) -> AddRepoOptions {
        let mut options = AddRepoOptions::new(url(u));
        options.alias = Some(alias.to_string());
        options.check = false;
        options
    }

    #[test]
    fn test_add_defaults() {
        let store = SqliteRepoStore::in_memory().unwrap();
        let out = Output::captured(Verbosity::Normal);

        let repo = add_repository(&store, &out, unchecked("http://a.example.com/", "a")).unwrap();
        assert!(repo.enabled);
        assert!(!repo.autorefresh);
        assert_eq!(repo.priority, DEFAULT_PRIORITY);
        assert_eq!(repo.repo_type, RepoType::Unknown);
        assert!(store.repository("a").unwrap().is_some());
    }

    #[test]
    fn test_add_changeable_media_turns_autorefresh_off() {
        let store = SqliteRepoStore::in_memory().unwrap();
        let out = Output::captured(Verbosity::Normal);
        let mut options = unchecked("dvd:///media/dvd", "dvd");
        options.autorefresh = Some(true);
        options.check = true;

        let repo = add_repository(&store, &out, options).unwrap();
        assert!(!repo.autorefresh);
        assert!(out.contains(MessageKind::Warning, "changeable media"));
    }

    #[test]
    fn test_add_rejects_zero_priority() {
        let store = SqliteRepoStore::in_memory().unwrap();
        let out = Output::captured(Verbosity::Normal);
        let mut options = unchecked("http://a.example.com/", "a");
        options.priority = Some(0);

        assert!(matches!(
            add_repository(&store, &out, options),
            Err(Error::InvalidArgument(_))
        ));
        assert!(store.repositories().unwrap().is_empty());
    }

    #[test]
    fn test_timestamp_alias_shape() {
        let alias = timestamp_alias();
        assert_eq!(alias.len(), 15);
        assert_eq!(&alias[8..9], "-");
    }

    #[test]
    fn test_repo_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extra.repo");
        fs::write(
            &path,
            r#"
[oss]
name = "Main"
baseurl = ["https://a.example.com/oss/"]
autorefresh = true

[broken]
name = "No URI"
"#,
        )
        .unwrap();

        let store = SqliteRepoStore::in_memory().unwrap();
        let results = add_repositories_from_file(&store, &path).unwrap();
        assert_eq!(results.len(), 2);

        let (alias, result) = &results[0];
        assert_eq!(alias, "broken");
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(results[1].1.is_ok());

        let stored = store.repository("oss").unwrap().unwrap();
        assert!(stored.autorefresh);
        assert_eq!(stored.file_path.as_deref(), Some(path.as_path()));

        let exported = export_repositories(&[stored]).unwrap();
        assert!(exported.contains("[oss]"));
        assert!(exported.contains("https://a.example.com/oss/"));
    }

    #[test]
    fn test_tri_state() {
        let out = Output::captured(Verbosity::Normal);
        assert_eq!(tri_state(&out, true, false, "--enable", "--disable"), Some(true));
        assert_eq!(tri_state(&out, false, true, "--enable", "--disable"), Some(false));
        assert_eq!(tri_state(&out, false, false, "--enable", "--disable"), None);
        assert_eq!(tri_state(&out, true, true, "--enable", "--disable"), None);
        assert!(out.contains(MessageKind::Warning, "Contradicting options"));
    }

    #[test]
    fn test_modify() {
        let store = SqliteRepoStore::in_memory().unwrap();
        let out = Output::captured(Verbosity::Normal);
        let repo = add_repository(&store, &out, unchecked("http://a.example.com/", "a")).unwrap();

        let nothing = RepoChanges {
            enabled: Some(true),
            ..Default::default()
        };
        assert!(!modify_repository(&store, &out, &repo, &nothing).unwrap());
        assert!(out.contains(MessageKind::Info, "Nothing to change for repository 'a'."));

        let changes = RepoChanges {
            enabled: Some(false),
            priority: Some(10),
            ..Default::default()
        };
        assert!(modify_repository(&store, &out, &repo, &changes).unwrap());
        let stored = store.repository("a").unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.priority, 10);

        let invalid = RepoChanges {
            priority: Some(0),
            ..Default::default()
        };
        assert!(modify_repository(&store, &out, &stored, &invalid).is_err());
    }

    #[test]
    fn test_filter_by_medium() {
        let repos = vec![
            RepositoryRecord::new("cd", vec![url("cd:///media/cd")]),
            RepositoryRecord::new("local", vec![url("file:///srv/repo")]),
            RepositoryRecord::new("remote", vec![url("https://a.example.com/")]),
        ];
        let aliases = |filter: RepoFilter| -> Vec<String> {
            filter.select(&repos).into_iter().map(|r| r.alias).collect()
        };

        assert_eq!(aliases(RepoFilter { local: true, ..Default::default() }), vec!["cd", "local"]);
        assert_eq!(aliases(RepoFilter { remote: true, ..Default::default() }), vec!["remote"]);
        assert_eq!(
            aliases(RepoFilter {
                medium_types: vec!["CD".to_string()],
                ..Default::default()
            }),
            vec!["cd"]
        );
        assert_eq!(aliases(RepoFilter { all: true, ..Default::default() }).len(), 3);
        assert!(RepoFilter::default().is_empty());
    }
}
