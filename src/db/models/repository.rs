// src/db/models/repository.rs

//! Repository model - a named, URI-addressed source of resolvables

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Default repository priority (lower number = higher precedence)
pub const DEFAULT_PRIORITY: u32 = 99;

/// URI schemes of read-only media that may have to be swapped by hand
const CHANGEABLE_MEDIA_SCHEMES: [&str; 2] = ["cd", "dvd"];

/// URI schemes that do not need the network
const LOCAL_SCHEMES: [&str; 5] = ["file", "dir", "cd", "dvd", "iso"];

/// Metadata format of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepoType {
    #[serde(rename = "rpm-md")]
    RpmMd,
    #[serde(rename = "yast2")]
    Yast2,
    #[serde(rename = "plaindir")]
    PlainDir,
    /// Not known yet, to be probed before caching
    #[default]
    #[serde(rename = "NONE")]
    Unknown,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::RpmMd => "rpm-md",
            RepoType::Yast2 => "yast2",
            RepoType::PlainDir => "plaindir",
            RepoType::Unknown => "NONE",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != RepoType::Unknown
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rpm-md" | "rpmmd" | "repomd" | "yum" | "up2date" => Ok(RepoType::RpmMd),
            "yast2" | "yast" | "susetags" => Ok(RepoType::Yast2),
            "plaindir" | "mount" => Ok(RepoType::PlainDir),
            "none" | "" => Ok(RepoType::Unknown),
            _ => Err(Error::InvalidArgument(format!(
                "'{}' is not a valid repository type.",
                s
            ))),
        }
    }
}

/// A repository definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    #[serde(skip)]
    pub id: Option<i64>,
    pub alias: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "baseurl")]
    pub base_urls: Vec<Url>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub autorefresh: bool,
    #[serde(default)]
    pub keep_packages: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, rename = "type")]
    pub repo_type: RepoType,
    /// Alias of the service managing this repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// File the definition was read from
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl RepositoryRecord {
    /// Create a new enabled repository with default settings
    pub fn new(alias: impl Into<String>, base_urls: Vec<Url>) -> Self {
        Self {
            id: None,
            alias: alias.into(),
            name: String::new(),
            base_urls,
            enabled: true,
            autorefresh: false,
            keep_packages: false,
            priority: DEFAULT_PRIORITY,
            repo_type: RepoType::Unknown,
            service: None,
            file_path: None,
        }
    }

    /// Name shown to the user; falls back to the alias
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.alias
        } else {
            &self.name
        }
    }

    /// Whether the repository lives on optical media
    pub fn is_changeable_media(&self) -> bool {
        self.base_urls
            .first()
            .is_some_and(|u| CHANGEABLE_MEDIA_SCHEMES.contains(&u.scheme()))
    }

    /// Whether the first base URI is reachable without the network
    pub fn is_local(&self) -> bool {
        self.base_urls
            .first()
            .is_some_and(|u| LOCAL_SCHEMES.contains(&u.scheme()))
    }

    /// Whether both records point at exactly the same set of base URIs
    pub fn same_base_urls(&self, other: &RepositoryRecord) -> bool {
        if self.base_urls.is_empty() || other.base_urls.len() != self.base_urls.len() {
            return false;
        }
        self.base_urls
            .iter()
            .all(|u| other.base_urls.iter().any(|o| urls_equal(u, o)))
    }

    /// Insert this repository and its base URIs
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (alias, name, enabled, autorefresh, keep_packages, priority, repo_type, service, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.alias,
                &self.name,
                self.enabled as i32,
                self.autorefresh as i32,
                self.keep_packages as i32,
                self.priority,
                self.repo_type.as_str(),
                &self.service,
                self.file_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.save_urls(conn, id)?;
        Ok(id)
    }

    fn save_urls(&self, conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repository_urls WHERE repository_id = ?1", [id])?;
        for (position, url) in self.base_urls.iter().enumerate() {
            conn.execute(
                "INSERT INTO repository_urls (repository_id, position, url) VALUES (?1, ?2, ?3)",
                params![id, position as i64, url.as_str()],
            )?;
        }
        Ok(())
    }

    fn load_urls(&mut self, conn: &Connection) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };

        let mut stmt = conn.prepare(
            "SELECT url FROM repository_urls WHERE repository_id = ?1 ORDER BY position",
        )?;
        let raw = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.base_urls = raw
            .iter()
            .map(|u| {
                Url::parse(u).map_err(|e| {
                    Error::ParseError(format!(
                        "Stored URI '{}' of repository '{}' is invalid: {}",
                        u, self.alias, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Find a repository by alias
    pub fn find_by_alias(conn: &Connection, alias: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, alias, name, enabled, autorefresh, keep_packages, priority, repo_type, service, file_path
             FROM repositories WHERE alias = ?1",
        )?;

        let repo = stmt.query_row([alias], Self::from_row).optional()?;
        match repo {
            Some(mut repo) => {
                repo.load_urls(conn)?;
                Ok(Some(repo))
            }
            None => Ok(None),
        }
    }

    /// List all repositories in enumeration order (by alias)
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, alias, name, enabled, autorefresh, keep_packages, priority, repo_type, service, file_path
             FROM repositories ORDER BY alias",
        )?;

        let mut repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for repo in &mut repos {
            repo.load_urls(conn)?;
        }
        Ok(repos)
    }

    /// Repositories managed by a service
    pub fn list_by_service(conn: &Connection, service: &str) -> Result<Vec<Self>> {
        Ok(Self::list_all(conn)?
            .into_iter()
            .filter(|r| r.service.as_deref() == Some(service))
            .collect())
    }

    /// Update all fields (including the alias) of a stored repository
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            Error::InitError("Cannot update repository without ID".to_string())
        })?;

        conn.execute(
            "UPDATE repositories SET alias = ?1, name = ?2, enabled = ?3, autorefresh = ?4,
             keep_packages = ?5, priority = ?6, repo_type = ?7, service = ?8, file_path = ?9
             WHERE id = ?10",
            params![
                &self.alias,
                &self.name,
                self.enabled as i32,
                self.autorefresh as i32,
                self.keep_packages as i32,
                self.priority,
                self.repo_type.as_str(),
                &self.service,
                self.file_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                id,
            ],
        )?;

        self.save_urls(conn, id)?;
        Ok(())
    }

    /// Delete a repository by alias; returns whether it existed
    pub fn delete(conn: &Connection, alias: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM repositories WHERE alias = ?1", [alias])?;
        Ok(removed > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let repo_type: String = row.get(7)?;
        let file_path: Option<String> = row.get(9)?;
        Ok(Self {
            id: Some(row.get(0)?),
            alias: row.get(1)?,
            name: row.get(2)?,
            base_urls: Vec::new(),
            enabled: row.get::<_, i32>(3)? != 0,
            autorefresh: row.get::<_, i32>(4)? != 0,
            keep_packages: row.get::<_, i32>(5)? != 0,
            priority: row.get(6)?,
            repo_type: repo_type.parse().unwrap_or_default(),
            service: row.get(8)?,
            file_path: file_path.map(PathBuf::from),
        })
    }
}

/// Structural URI equality, ignoring a trailing slash on the path
pub fn urls_equal(a: &Url, b: &Url) -> bool {
    if a == b {
        return true;
    }
    a.scheme() == b.scheme()
        && a.username() == b.username()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
        && a.query() == b.query()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseKind, open_in_memory};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let conn = open_in_memory(DatabaseKind::Repositories).unwrap();

        let mut repo = RepositoryRecord::new(
            "oss",
            vec![url("http://mirror.example.com/oss"), url("http://backup.example.com/oss")],
        );
        repo.name = "Main Repository".to_string();
        repo.autorefresh = true;
        repo.repo_type = RepoType::RpmMd;
        repo.insert(&conn).unwrap();

        let found = RepositoryRecord::find_by_alias(&conn, "oss").unwrap().unwrap();
        assert_eq!(found, repo);
        assert_eq!(found.base_urls.len(), 2);
        assert_eq!(found.base_urls[1].host_str(), Some("backup.example.com"));
        assert!(RepositoryRecord::find_by_alias(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_list_all_orders_by_alias() {
        let conn = open_in_memory(DatabaseKind::Repositories).unwrap();
        for alias in ["zeta", "alpha", "mid"] {
            RepositoryRecord::new(alias, vec![url(&format!("file:///srv/{}", alias))])
                .insert(&conn)
                .unwrap();
        }

        let aliases: Vec<_> = RepositoryRecord::list_all(&conn)
            .unwrap()
            .into_iter()
            .map(|r| r.alias)
            .collect();
        assert_eq!(aliases, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_update_renames_and_replaces_urls() {
        let conn = open_in_memory(DatabaseKind::Repositories).unwrap();
        let mut repo = RepositoryRecord::new("old", vec![url("http://a.example.com/")]);
        repo.insert(&conn).unwrap();

        repo.alias = "new".to_string();
        repo.base_urls = vec![url("http://b.example.com/")];
        repo.priority = 10;
        repo.update(&conn).unwrap();

        assert!(RepositoryRecord::find_by_alias(&conn, "old").unwrap().is_none());
        let found = RepositoryRecord::find_by_alias(&conn, "new").unwrap().unwrap();
        assert_eq!(found.priority, 10);
        assert_eq!(found.base_urls, vec![url("http://b.example.com/")]);
    }

    #[test]
    fn test_delete_cascades_urls() {
        let conn = open_in_memory(DatabaseKind::Repositories).unwrap();
        RepositoryRecord::new("gone", vec![url("http://a.example.com/")])
            .insert(&conn)
            .unwrap();

        assert!(RepositoryRecord::delete(&conn, "gone").unwrap());
        assert!(!RepositoryRecord::delete(&conn, "gone").unwrap());

        let urls: i64 = conn
            .query_row("SELECT COUNT(*) FROM repository_urls", [], |row| row.get(0))
            .unwrap();
        assert_eq!(urls, 0);
    }

    #[test]
    fn test_repo_type_parsing() {
        assert_eq!("yum".parse::<RepoType>().unwrap(), RepoType::RpmMd);
        assert_eq!("susetags".parse::<RepoType>().unwrap(), RepoType::Yast2);
        assert_eq!("NONE".parse::<RepoType>().unwrap(), RepoType::Unknown);
        assert!("deb".parse::<RepoType>().is_err());
    }

    #[test]
    fn test_media_classification() {
        let dvd = RepositoryRecord::new("dvd", vec![url("dvd:///?devices=/dev/sr0")]);
        assert!(dvd.is_changeable_media());
        assert!(dvd.is_local());

        let http = RepositoryRecord::new("web", vec![url("https://example.com/repo")]);
        assert!(!http.is_changeable_media());
        assert!(!http.is_local());
    }

    #[test]
    fn test_same_base_urls_ignores_order_and_trailing_slash() {
        let a = RepositoryRecord::new(
            "a",
            vec![url("http://x.example.com/repo/"), url("http://y.example.com/repo")],
        );
        let b = RepositoryRecord::new(
            "b",
            vec![url("http://y.example.com/repo"), url("http://x.example.com/repo")],
        );
        let c = RepositoryRecord::new("c", vec![url("http://x.example.com/repo")]);

        assert!(a.same_base_urls(&b));
        assert!(!a.same_base_urls(&c));
        assert!(!RepositoryRecord::new("e", vec![]).same_base_urls(&RepositoryRecord::new("f", vec![])));
    }
}
