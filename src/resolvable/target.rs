// src/resolvable/target.rs

//! Target collaborator: the installed system being managed
//!
//! The target database lives below the managed root and records installed
//! resolvables and package locks. It is opened by `initialize`; every other
//! operation fails until then.

use super::solver::Change;
use crate::db::models::{PackageLock, Resolvable};
use crate::db::{self, DatabaseKind};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Installed-system collaborator
pub trait Target {
    /// Open the installed-system database
    fn initialize(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// All installed resolvables
    fn installed(&self) -> Result<Vec<Resolvable>>;

    /// Apply a set of changes atomically
    fn commit(&mut self, changes: &[Change]) -> Result<()>;

    fn locks(&self) -> Result<Vec<PackageLock>>;

    fn add_lock(&mut self, lock: &mut PackageLock) -> Result<()>;

    fn remove_lock(&mut self, id: i64) -> Result<bool>;

    /// Drop every lock; returns how many there were
    fn clean_locks(&mut self) -> Result<usize>;
}

/// SQLite-backed target
pub struct SqliteTarget {
    path: PathBuf,
    conn: Option<Connection>,
    /// The database could not be created; an empty system is read instead
    read_only: bool,
}

impl SqliteTarget {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
            read_only: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::TargetError("target is not initialized".to_string()))
    }

    fn writable_conn(&self) -> Result<&Connection> {
        if self.read_only {
            return Err(Error::TargetError(format!(
                "{} cannot be created.",
                self.path.display()
            )));
        }
        self.conn()
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        if self.read_only {
            return Err(Error::TargetError(format!(
                "{} cannot be created.",
                self.path.display()
            )));
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::TargetError("target is not initialized".to_string()))
    }
}

impl Target for SqliteTarget {
    fn initialize(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = match db::open(&self.path, DatabaseKind::Target) {
            Ok(conn) => conn,
            // Nothing installed through pkgctl yet, and no permission to
            // record anything
            Err(e) if !self.path.exists() => {
                warn!("Reading an empty installed system: {}", e);
                self.read_only = true;
                db::open_in_memory(DatabaseKind::Target)?
            }
            Err(e) => {
                return Err(Error::TargetError(format!("{}: {}", self.path.display(), e)));
            }
        };
        debug!("Target initialized at {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.conn.is_some()
    }

    fn installed(&self) -> Result<Vec<Resolvable>> {
        Resolvable::list_installed(self.conn()?)
    }

    fn commit(&mut self, changes: &[Change]) -> Result<()> {
        db::transaction(self.conn_mut()?, |tx| {
            for change in changes {
                match change {
                    Change::Install(resolvable) => resolvable.record_installed(tx)?,
                    Change::Remove(resolvable) => {
                        Resolvable::forget_installed(tx, resolvable.kind, &resolvable.name)?;
                    }
                }
            }
            Ok(())
        })?;
        info!("Committed {} changes to the target", changes.len());
        Ok(())
    }

    fn locks(&self) -> Result<Vec<PackageLock>> {
        PackageLock::list_all(self.conn()?)
    }

    fn add_lock(&mut self, lock: &mut PackageLock) -> Result<()> {
        lock.insert(self.writable_conn()?)?;
        Ok(())
    }

    fn remove_lock(&mut self, id: i64) -> Result<bool> {
        PackageLock::delete(self.writable_conn()?, id)
    }

    fn clean_locks(&mut self) -> Result<usize> {
        PackageLock::delete_all(self.writable_conn()?)
    }
}
