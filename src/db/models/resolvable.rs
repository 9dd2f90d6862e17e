// src/db/models/resolvable.rs

//! Resolvable model and the resolvable cache tables
//!
//! A resolvable is any installable or queryable unit: package, source
//! package, patch, pattern or product. The same struct is used for the
//! raw metadata index, the per-repository cache and the installed system.

use crate::error::{Error, Result};
use crate::version::{Capability, Edition};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of resolvable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvableKind {
    #[default]
    Package,
    SrcPackage,
    Patch,
    Pattern,
    Product,
}

impl ResolvableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvableKind::Package => "package",
            ResolvableKind::SrcPackage => "srcpackage",
            ResolvableKind::Patch => "patch",
            ResolvableKind::Pattern => "pattern",
            ResolvableKind::Product => "product",
        }
    }
}

impl fmt::Display for ResolvableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResolvableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "package" | "pkg" => Ok(ResolvableKind::Package),
            "srcpackage" | "source" => Ok(ResolvableKind::SrcPackage),
            "patch" => Ok(ResolvableKind::Patch),
            "pattern" => Ok(ResolvableKind::Pattern),
            "product" => Ok(ResolvableKind::Product),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown resolvable type '{}'. Valid types are package, srcpackage, patch, pattern, product.",
                s
            ))),
        }
    }
}

/// An installable or queryable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolvable {
    #[serde(default)]
    pub kind: ResolvableKind,
    pub name: String,
    #[serde(rename = "version")]
    pub edition: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default)]
    pub summary: String,
    /// Patch category (security, recommended, optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Weak requirements, installed when available but never enforced
    #[serde(default)]
    pub recommends: Vec<String>,
    /// Repository the resolvable comes from; `None` for the installed system
    #[serde(skip)]
    pub repo_alias: Option<String>,
}

fn default_arch() -> String {
    "noarch".to_string()
}

impl Resolvable {
    pub fn new(kind: ResolvableKind, name: impl Into<String>, edition: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            edition: edition.into(),
            arch: default_arch(),
            summary: String::new(),
            category: None,
            provides: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            recommends: Vec::new(),
            repo_alias: None,
        }
    }

    /// Parsed edition
    pub fn parsed_edition(&self) -> Result<Edition> {
        Edition::parse(&self.edition)
    }

    /// `name-edition.arch`
    pub fn ident(&self) -> String {
        format!("{}-{}.{}", self.name, self.edition, self.arch)
    }

    pub fn is_security_patch(&self) -> bool {
        self.kind == ResolvableKind::Patch && self.category.as_deref() == Some("security")
    }

    /// Whether this resolvable provides `wanted`, by name or explicit provides
    pub fn provides_capability(&self, wanted: &Capability) -> bool {
        if let Ok(edition) = self.parsed_edition()
            && wanted.matches(&self.name, &edition)
        {
            return true;
        }
        self.provides
            .iter()
            .filter_map(|p| Capability::parse(p).ok())
            .any(|p| wanted.is_satisfied_by(&p))
    }

    /// Insert into the cache of `repo_alias`
    pub fn insert_cached(&self, conn: &Connection, repo_alias: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO resolvables (repo_alias, kind, name, edition, arch, summary, category,
                                      provides, requires, conflicts, recommends)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                repo_alias,
                self.kind.as_str(),
                &self.name,
                &self.edition,
                &self.arch,
                &self.summary,
                &self.category,
                serde_json::to_string(&self.provides)?,
                serde_json::to_string(&self.requires)?,
                serde_json::to_string(&self.conflicts)?,
                serde_json::to_string(&self.recommends)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Cached resolvables of one repository, in insertion order
    pub fn list_cached(conn: &Connection, repo_alias: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT kind, name, edition, arch, summary, category, provides, requires, repo_alias,
                    conflicts, recommends
             FROM resolvables WHERE repo_alias = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([repo_alias], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Drop the cached resolvables of one repository
    pub fn delete_cached(conn: &Connection, repo_alias: &str) -> Result<usize> {
        Ok(conn.execute("DELETE FROM resolvables WHERE repo_alias = ?1", [repo_alias])?)
    }

    /// Shared row decoder for `resolvables` and `installed`
    ///
    /// Column order: kind, name, edition, arch, summary, category,
    /// provides, requires, repo alias, conflicts, recommends.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind: String = row.get(0)?;
        let provides: String = row.get(6)?;
        let requires: String = row.get(7)?;
        let conflicts: String = row.get(9)?;
        let recommends: String = row.get(10)?;
        Ok(Self {
            kind: kind.parse().unwrap_or_default(),
            name: row.get(1)?,
            edition: row.get(2)?,
            arch: row.get(3)?,
            summary: row.get(4)?,
            category: row.get(5)?,
            provides: serde_json::from_str(&provides).unwrap_or_default(),
            requires: serde_json::from_str(&requires).unwrap_or_default(),
            conflicts: serde_json::from_str(&conflicts).unwrap_or_default(),
            recommends: serde_json::from_str(&recommends).unwrap_or_default(),
            repo_alias: row.get(8)?,
        })
    }
}

/// Which raw metadata a repository cache was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub repo_alias: String,
    pub checksum: String,
    pub built_at: String,
}

impl CacheStatus {
    pub fn find(conn: &Connection, repo_alias: &str) -> Result<Option<Self>> {
        let status = conn
            .query_row(
                "SELECT repo_alias, checksum, built_at FROM cache_status WHERE repo_alias = ?1",
                [repo_alias],
                |row| {
                    Ok(Self {
                        repo_alias: row.get(0)?,
                        checksum: row.get(1)?,
                        built_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO cache_status (repo_alias, checksum, built_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(repo_alias) DO UPDATE SET checksum = excluded.checksum, built_at = excluded.built_at",
            params![&self.repo_alias, &self.checksum, &self.built_at],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, repo_alias: &str) -> Result<()> {
        conn.execute("DELETE FROM cache_status WHERE repo_alias = ?1", [repo_alias])?;
        Ok(())
    }
}
