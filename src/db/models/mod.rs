// src/db/models/mod.rs

//! Data models for pkgctl database entities
//!
//! Each struct corresponds to a database table and provides methods for
//! creating, reading, updating, and deleting records.

mod installed;
mod repository;
mod resolvable;
mod service;

pub use installed::{PackageLock, wildcard_match};
pub use repository::{DEFAULT_PRIORITY, RepoType, RepositoryRecord, urls_equal};
pub use resolvable::{CacheStatus, Resolvable, ResolvableKind};
pub use service::ServiceRecord;
