// src/db/models/installed.rs

//! Installed-system tables: installed resolvables and package locks

use super::resolvable::{Resolvable, ResolvableKind};
use crate::error::Result;
use rusqlite::{Connection, Row, params};
use serde::Serialize;

impl Resolvable {
    /// Record as installed, replacing any installed resolvable of the same kind and name
    pub fn record_installed(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installed (kind, name, edition, arch, summary, category, provides, requires,
                                    from_repo, conflicts, recommends)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(kind, name) DO UPDATE SET
                edition = excluded.edition, arch = excluded.arch, summary = excluded.summary,
                category = excluded.category, provides = excluded.provides,
                requires = excluded.requires, from_repo = excluded.from_repo,
                conflicts = excluded.conflicts, recommends = excluded.recommends,
                installed_at = CURRENT_TIMESTAMP",
            params![
                self.kind.as_str(),
                &self.name,
                &self.edition,
                &self.arch,
                &self.summary,
                &self.category,
                serde_json::to_string(&self.provides)?,
                serde_json::to_string(&self.requires)?,
                &self.repo_alias,
                serde_json::to_string(&self.conflicts)?,
                serde_json::to_string(&self.recommends)?,
            ],
        )?;
        Ok(())
    }

    /// All installed resolvables
    ///
    /// The returned resolvables carry no repository alias.
    pub fn list_installed(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT kind, name, edition, arch, summary, category, provides, requires, NULL,
                    conflicts, recommends
             FROM installed ORDER BY kind, name",
        )?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove an installed resolvable; returns whether it was installed
    pub fn forget_installed(conn: &Connection, kind: ResolvableKind, name: &str) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM installed WHERE kind = ?1 AND name = ?2",
            params![kind.as_str(), name],
        )?;
        Ok(removed > 0)
    }
}

/// A package lock: matching resolvables are never changed by the solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageLock {
    pub id: Option<i64>,
    /// Name, may contain `*` and `?` wildcards
    pub name: String,
    pub kind: ResolvableKind,
    /// Restrict the lock to one repository
    pub repo_alias: Option<String>,
}

impl PackageLock {
    pub fn new(name: impl Into<String>, kind: ResolvableKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            repo_alias: None,
        }
    }

    /// Whether the lock applies to `resolvable`
    pub fn applies_to(&self, resolvable: &Resolvable) -> bool {
        if resolvable.kind != self.kind || !wildcard_match(&self.name, &resolvable.name) {
            return false;
        }
        match (&self.repo_alias, &resolvable.repo_alias) {
            (None, _) => true,
            (Some(lock_repo), Some(repo)) => lock_repo == repo,
            // Installed resolvables have no repository
            (Some(_), None) => false,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO locks (name, kind, repo_alias) VALUES (?1, ?2, ?3)",
            params![&self.name, self.kind.as_str(), &self.repo_alias],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// All locks in creation order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, kind, repo_alias FROM locks ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        Ok(conn.execute("DELETE FROM locks WHERE id = ?1", [id])? > 0)
    }

    pub fn delete_all(conn: &Connection) -> Result<usize> {
        Ok(conn.execute("DELETE FROM locks", [])?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind: String = row.get(2)?;
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            kind: kind.parse().unwrap_or_default(),
            repo_alias: row.get(3)?,
        })
    }
}

/// Shell-style wildcard match supporting `*` and `?`
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}
