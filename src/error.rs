// src/error.rs

//! Error types for pkgctl
//!
//! One crate-wide error enum covers every failure the orchestration layer
//! can report. Each variant maps onto exactly one process exit code, and
//! selector, privilege and configuration errors carry a one-line hint.

use crate::exit_code::ExitCode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pkgctl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pkgctl
#[derive(Error, Debug)]
pub enum Error {
    /// Database failure in one of the SQLite stores
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// A string that should have been a URI was not
    #[error("Invalid URI: {0}")]
    UrlError(#[from] url::ParseError),

    /// Bad command-line usage
    #[error("{0}")]
    SyntaxError(String),

    /// Bad argument value
    #[error("{0}")]
    InvalidArgument(String),

    /// Repository selectors that matched nothing
    #[error("{}", unmatched_selectors("Repository", .0))]
    InvalidSelectors(Vec<String>),

    /// Service selectors that matched nothing
    #[error("{}", unmatched_selectors("Service", .0))]
    InvalidServiceSelectors(Vec<String>),

    /// Command needs elevated privileges
    #[error("{0}")]
    PrivilegeError(String),

    #[error("{0}")]
    NotFoundError(String),

    /// Alias collision in the repository or service store
    #[error("{0}")]
    ConflictError(String),

    /// Refresh or cache failure that escalated to the whole command
    #[error("{0}")]
    RepositoryError(String),

    /// Installed system could not be initialized or read
    #[error("Target initialization failed: {0}")]
    TargetError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    /// Store or configuration could not be set up
    #[error("Initialization error: {0}")]
    InitError(String),

    /// Another instance holds the system lock
    #[error("A package management transaction is already in progress (lock held on {})", .0.display())]
    LibraryBusy(PathBuf),

    /// State that should be impossible, escalated as a likely defect
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Clean early termination requested by the user
    #[error("Aborted by user")]
    UserAbort,
}

fn unmatched_selectors(what: &str, selectors: &[String]) -> String {
    selectors
        .iter()
        .map(|s| format!("{} '{}' not found by its alias, number, or URI.", what, s))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Exit code this error terminates the command with
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::SyntaxError(_) => ExitCode::Syntax,
            Error::InvalidArgument(_)
            | Error::InvalidSelectors(_)
            | Error::InvalidServiceSelectors(_)
            | Error::UrlError(_) => ExitCode::InvalidArgs,
            Error::PrivilegeError(_) => ExitCode::Privileges,
            Error::LibraryBusy(_) => ExitCode::LibraryBusy,
            Error::UserAbort => ExitCode::Aborted,
            Error::InternalInconsistency(_) => ExitCode::Bug,
            Error::DatabaseError(_)
            | Error::IoError(_)
            | Error::NotFoundError(_)
            | Error::ConflictError(_)
            | Error::RepositoryError(_)
            | Error::TargetError(_)
            | Error::ParseError(_)
            | Error::DownloadError(_)
            | Error::InitError(_) => ExitCode::LibraryError,
        }
    }

    /// One-line actionable hint shown below the error message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::InvalidSelectors(_) => {
                Some("Use 'pkgctl repos' to get the list of defined repositories.")
            }
            Error::InvalidServiceSelectors(_) => {
                Some("Use 'pkgctl services' to get the list of defined services.")
            }
            Error::PrivilegeError(_) => {
                Some("Run this command as root, or use --root to manage an alternate system root.")
            }
            Error::LibraryBusy(_) => Some(
                "Close the other package management application or wait for it to finish, then try again.",
            ),
            Error::TargetError(_) => {
                Some("Running 'pkgctl refresh' as root might resolve the problem.")
            }
            Error::InitError(_) => Some("Check the configuration file and the directory options."),
            Error::InternalInconsistency(_) => Some("Please file a bug report about this."),
            _ => None,
        }
    }

    /// Whether the error comes from a defect rather than the environment
    pub fn is_bug(&self) -> bool {
        self.exit_code() == ExitCode::Bug
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}
