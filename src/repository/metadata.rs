// src/repository/metadata.rs

//! Repository metadata: on-media index format and the metadata collaborator
//!
//! A repository base URI points at a directory holding `index.json`:
//!
//! ```json
//! {
//!   "name": "Main Repository",
//!   "type": "rpm-md",
//!   "resolvables": [
//!     {"kind": "package", "name": "nginx", "version": "1.24.0-1", "arch": "x86_64"}
//!   ]
//! }
//! ```
//!
//! A service URI points at a directory holding `repoindex.json`, listing
//! the repositories the service publishes.
//!
//! The `MetadataService` trait is the seam between the orchestration layer
//! (refresh engine, initializer, loader) and whatever actually fetches,
//! stores and parses metadata.

use crate::db::models::{RepoType, RepositoryRecord, Resolvable, ServiceRecord, DEFAULT_PRIORITY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Name of the repository index below a base URI
pub const INDEX_FILE: &str = "index.json";

/// Name of the service index below a service URI
pub const SERVICE_INDEX_FILE: &str = "repoindex.json";

/// Repository index as published on the media
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryIndex {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub repo_type: RepoType,
    #[serde(default)]
    pub resolvables: Vec<Resolvable>,
}

/// Service index as published by a service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceIndex {
    #[serde(default)]
    pub repositories: Vec<ServiceRepository>,
}

/// One repository published by a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRepository {
    pub alias: String,
    #[serde(default)]
    pub name: String,
    pub url: Url,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub autorefresh: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl ServiceRepository {
    /// Repository record owned by `service`
    pub fn into_record(self, service: &str) -> RepositoryRecord {
        let mut repo = RepositoryRecord::new(self.alias, vec![self.url]);
        repo.name = self.name;
        repo.enabled = self.enabled;
        repo.autorefresh = self.autorefresh;
        repo.priority = self.priority;
        repo.service = Some(service.to_string());
        repo
    }
}

/// Status of the raw metadata stored for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStatus {
    /// sha256 of the raw index
    pub checksum: String,
    /// Last time the index was fetched or confirmed up to date
    pub checked_at: DateTime<Utc>,
    /// URI the index was fetched from
    pub url: Url,
}

/// How eagerly raw metadata is refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Download unconditionally
    Forced,
    /// Download if the media changed, honouring the check delay
    IfNeeded,
    /// Download if the media changed, ignoring the check delay
    IfNeededIgnoreDelay,
}

/// How eagerly the resolvable cache is rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPolicy {
    Forced,
    IfNeeded,
}

/// Result of an up-to-date check against one base URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshCheck {
    UpToDate,
    NeedsRefresh,
    /// The last check is too recent to check again
    CheckDelayed,
}

/// Failures reported by the metadata collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Media could not be read (network, missing file, bad status)
    #[error("{0}")]
    Media(String),

    /// Changeable media is not inserted
    #[error("Media not present: {0}")]
    MediaChangeRequired(String),

    #[error("No URIs defined")]
    NoUrl,

    #[error("No alias defined")]
    NoAlias,

    /// Media does not hold a usable repository
    #[error("{0}")]
    InvalidRepository(String),

    /// Raw metadata exists but cannot be parsed
    #[error("{0}")]
    Parse(String),

    /// Raw metadata is missing from the local cache
    #[error("Repository metadata not found in local cache")]
    NotCached,

    #[error("Aborted by user")]
    Aborted,

    #[error("{0}")]
    Other(String),
}

/// Metadata-status, retrieval and cache collaborator
///
/// Every operation is keyed by repository (and base URI where relevant).
pub trait MetadataService {
    /// Check one base URI for changed metadata
    fn check_if_refresh_needed(
        &self,
        repo: &RepositoryRecord,
        url: &Url,
        policy: RefreshPolicy,
    ) -> Result<RefreshCheck, MetadataError>;

    /// Fetch raw metadata from the first base URI that works
    fn refresh_metadata(
        &self,
        repo: &RepositoryRecord,
        policy: RefreshPolicy,
    ) -> Result<(), MetadataError>;

    /// Build the resolvable cache from raw metadata
    fn build_cache(&self, repo: &RepositoryRecord, policy: BuildPolicy)
    -> Result<(), MetadataError>;

    /// Status of the stored raw metadata, if any
    fn metadata_status(&self, repo: &RepositoryRecord) -> Option<MetadataStatus>;

    /// Whether the resolvable cache is built
    fn is_cached(&self, repo: &RepositoryRecord) -> bool;

    /// Resolvables from the cache, tagged with the repository alias
    fn load_from_cache(&self, repo: &RepositoryRecord) -> Result<Vec<Resolvable>, MetadataError>;

    /// Drop the resolvable cache
    fn clean_cache(&self, repo: &RepositoryRecord) -> Result<(), MetadataError>;

    /// Drop the raw metadata
    fn clean_raw_metadata(&self, repo: &RepositoryRecord) -> Result<(), MetadataError>;

    /// Drop downloaded packages
    fn clean_packages(&self, repo: &RepositoryRecord) -> Result<(), MetadataError>;

    /// Repositories currently published by a service
    fn refresh_service(
        &self,
        service: &ServiceRecord,
    ) -> Result<Vec<RepositoryRecord>, MetadataError>;
}
