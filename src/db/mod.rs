// src/db/mod.rs

//! SQLite persistence
//!
//! pkgctl keeps three databases, each with its own schema history:
//!
//! - the repository store (`repos.db`): repositories, their base URIs, services
//! - the resolvable cache (`cache.db`): resolvables built from raw metadata
//! - the target (`target.db`): installed resolvables and package locks

pub mod models;
pub mod paths;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::Path;
use tracing::debug;

pub use schema::DatabaseKind;

/// Open (creating if needed) a database and bring its schema up to date
pub fn open(path: &Path, kind: DatabaseKind) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::InitError(format!(
                "Failed to create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    debug!("Opening {:?} database at {}", kind, path.display());
    let conn = Connection::open(path)?;
    configure(&conn)?;
    schema::migrate(&conn, kind)?;
    Ok(conn)
}

/// In-memory database with a current schema
pub fn open_in_memory(kind: DatabaseKind) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn, kind)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Run `f` inside a transaction, committing on success
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
