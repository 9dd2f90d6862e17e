// src/lib.rs

//! pkgctl: command-line package manager front end
//!
//! The crate sequences repository refresh, cache building, resolvable
//! loading and package transactions for one command (or one interactive
//! shell session) over a set of collaborators.
//!
//! # Architecture
//!
//! - Store: known repositories and services in SQLite
//! - Metadata: raw repository metadata and the built resolvable cache
//! - Target: installed system and package locks
//! - Session: per-process latches and the per-command lifecycle
//! - Exit codes: one stable code per failure class

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
mod error;
pub mod exit_code;
pub mod lock;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod repository;
pub mod resolvable;
pub mod session;
pub mod version;

pub use config::{Config, EscalationPolicy};
pub use error::{Error, Result};
pub use exit_code::ExitCode;
pub use output::{MessageKind, Output, Verbosity};
pub use repository::{
    LocalMetadataService, MetadataService, RepoSetInitializer, RepoStore, SqliteRepoStore,
};
pub use resolvable::{ResolvablePool, SimpleSolver, SqliteTarget};
pub use session::{Collaborators, GlobalOptions, Session};
pub use version::{Capability, Edition};
