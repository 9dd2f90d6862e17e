// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Each database kind has its own linear migration chain tracked in a
//! `schema_version` table. Migrations only ever move forward.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Which pkgctl database a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// Repository and service definitions
    Repositories,
    /// Resolvables built from raw repository metadata
    Cache,
    /// Installed system and package locks
    Target,
}

impl DatabaseKind {
    /// Latest schema version for this database
    pub fn current_version(self) -> i32 {
        match self {
            DatabaseKind::Repositories => 2,
            DatabaseKind::Cache => 2,
            DatabaseKind::Target => 2,
        }
    }
}

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection, kind: DatabaseKind) -> Result<()> {
    let current = get_schema_version(conn)?;
    let target = kind.current_version();

    if current >= target {
        debug!("{:?} schema is up to date (version {})", kind, current);
        return Ok(());
    }

    for version in (current + 1)..=target {
        info!("Applying {:?} migration to version {}", kind, version);
        apply_migration(conn, kind, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, kind: DatabaseKind, version: i32) -> Result<()> {
    match (kind, version) {
        (DatabaseKind::Repositories, 1) => migrate_repositories_v1(conn),
        (DatabaseKind::Repositories, 2) => migrate_repositories_v2(conn),
        (DatabaseKind::Cache, 1) => migrate_cache_v1(conn),
        (DatabaseKind::Cache, 2) => add_weak_dependency_columns(conn, "resolvables"),
        (DatabaseKind::Target, 1) => migrate_target_v1(conn),
        (DatabaseKind::Target, 2) => add_weak_dependency_columns(conn, "installed"),
        _ => Err(Error::InitError(format!(
            "Unknown {:?} migration version: {}",
            kind, version
        ))),
    }
}

/// Repositories and their ordered base URIs
fn migrate_repositories_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            enabled INTEGER NOT NULL DEFAULT 1,
            autorefresh INTEGER NOT NULL DEFAULT 0,
            keep_packages INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 99,
            repo_type TEXT NOT NULL DEFAULT 'NONE',
            file_path TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE repository_urls (
            repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (repository_id, position)
        );

        CREATE INDEX idx_repository_urls_url ON repository_urls(url);",
    )?;
    Ok(())
}

/// Services, and the service owning each repository
fn migrate_repositories_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        ALTER TABLE repositories ADD COLUMN service TEXT;",
    )?;
    Ok(())
}

fn migrate_cache_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE resolvables (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repo_alias TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            edition TEXT NOT NULL,
            arch TEXT NOT NULL DEFAULT 'noarch',
            summary TEXT NOT NULL DEFAULT '',
            category TEXT,
            provides TEXT NOT NULL DEFAULT '[]',
            requires TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX idx_resolvables_repo ON resolvables(repo_alias);
        CREATE INDEX idx_resolvables_name ON resolvables(name);

        CREATE TABLE cache_status (
            repo_alias TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            built_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn migrate_target_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE installed (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            edition TEXT NOT NULL,
            arch TEXT NOT NULL DEFAULT 'noarch',
            summary TEXT NOT NULL DEFAULT '',
            category TEXT,
            provides TEXT NOT NULL DEFAULT '[]',
            requires TEXT NOT NULL DEFAULT '[]',
            from_repo TEXT,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (kind, name)
        );

        CREATE TABLE locks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'package',
            repo_alias TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

/// Conflicts and recommends, stored like provides and requires
fn add_weak_dependency_columns(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "ALTER TABLE {table} ADD COLUMN conflicts TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE {table} ADD COLUMN recommends TEXT NOT NULL DEFAULT '[]';"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_migrate_each_kind() {
        for (kind, table) in [
            (DatabaseKind::Repositories, "services"),
            (DatabaseKind::Cache, "cache_status"),
            (DatabaseKind::Target, "locks"),
        ] {
            let conn = Connection::open_in_memory().unwrap();
            migrate(&conn, kind).unwrap();
            assert!(table_exists(&conn, table), "{:?} lacks {}", kind, table);
            assert_eq!(get_schema_version(&conn).unwrap(), kind.current_version());
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn, DatabaseKind::Repositories).unwrap();
        migrate(&conn, DatabaseKind::Repositories).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_upgrade_keeps_installed_rows() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema_version(&conn).unwrap();
        migrate_target_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        conn.execute(
            "INSERT INTO installed (kind, name, edition) VALUES ('package', 'vim', '9.0')",
            [],
        )
        .unwrap();

        migrate(&conn, DatabaseKind::Target).unwrap();
        let conflicts: String = conn
            .query_row("SELECT conflicts FROM installed WHERE name = 'vim'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(conflicts, "[]");
        assert_eq!(get_schema_version(&conn).unwrap(), 2);
    }
}
