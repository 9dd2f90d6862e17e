// src/repository/mod.rs

//! Repository orchestration
//!
//! This module provides:
//! - The repository store collaborator and its SQLite implementation
//! - Selector resolution (alias, 1-based position, base URI)
//! - The metadata collaborator and its local-filesystem implementation
//! - The per-repository refresh state machine
//! - The latched active repository set of a command
//! - Repository and service management helpers

mod client;
mod local;
mod store;

pub mod init;
pub mod locator;
pub mod management;
pub mod metadata;
pub mod refresh;

#[cfg(test)]
pub(crate) mod fake;

pub use client::MediaFetcher;
pub use init::{
    ActiveRepo, ActiveRepoSet, FailureScope, InitRequest, PLUS_REPO_PREFIX, RefreshSummary,
    RepoSetInitializer,
};
pub use local::LocalMetadataService;
pub use locator::{Locatable, Located, locate, locate_many};
pub use metadata::{
    BuildPolicy, MetadataError, MetadataService, MetadataStatus, RefreshCheck, RefreshPolicy,
};
pub use refresh::{
    CacheError, RefreshEngine, RefreshError, RefreshOptions, RefreshOutcome, RefreshState,
    RepoRefresh,
};
pub use store::{RepoStore, SqliteRepoStore};
