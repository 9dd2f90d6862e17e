// src/db/models/service.rs

//! Service model - a provider-side index that manages a set of repositories

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use url::Url;

/// A service definition
///
/// The service does not own its repositories; repositories point back at
/// the service through `RepositoryRecord::service`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(skip)]
    pub id: Option<i64>,
    pub alias: String,
    #[serde(default)]
    pub name: String,
    pub url: Url,
    pub enabled: bool,
}

impl ServiceRecord {
    pub fn new(alias: impl Into<String>, url: Url) -> Self {
        Self {
            id: None,
            alias: alias.into(),
            name: String::new(),
            url,
            enabled: true,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.alias
        } else {
            &self.name
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO services (alias, name, url, enabled) VALUES (?1, ?2, ?3, ?4)",
            params![&self.alias, &self.name, self.url.as_str(), self.enabled as i32],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_alias(conn: &Connection, alias: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, alias, name, url, enabled FROM services WHERE alias = ?1")?;
        let service = stmt.query_row([alias], Self::from_row).optional()?;
        service.transpose()
    }

    /// List all services ordered by alias
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, alias, name, url, enabled FROM services ORDER BY alias")?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update service without ID".to_string()))?;

        conn.execute(
            "UPDATE services SET alias = ?1, name = ?2, url = ?3, enabled = ?4 WHERE id = ?5",
            params![&self.alias, &self.name, self.url.as_str(), self.enabled as i32, id],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, alias: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM services WHERE alias = ?1", [alias])?;
        Ok(removed > 0)
    }

    // The stored URL is re-parsed, so a corrupted row surfaces as a
    // ParseError instead of a SQLite conversion error.
    fn from_row(row: &Row) -> rusqlite::Result<Result<Self>> {
        let alias: String = row.get(1)?;
        let raw_url: String = row.get(3)?;
        let id = row.get(0)?;
        let name = row.get(2)?;
        let enabled = row.get::<_, i32>(4)? != 0;

        Ok(Url::parse(&raw_url)
            .map(|url| Self {
                id: Some(id),
                alias: alias.clone(),
                name,
                url,
                enabled,
            })
            .map_err(|e| {
                Error::ParseError(format!(
                    "Stored URI '{}' of service '{}' is invalid: {}",
                    raw_url, alias, e
                ))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseKind, open_in_memory};

    #[test]
    fn test_service_crud() {
        let conn = open_in_memory(DatabaseKind::Repositories).unwrap();

        let mut service =
            ServiceRecord::new("updates", Url::parse("https://example.com/service").unwrap());
        service.name = "Update Service".to_string();
        service.insert(&conn).unwrap();

        let found = ServiceRecord::find_by_alias(&conn, "updates").unwrap().unwrap();
        assert_eq!(found, service);
        assert_eq!(found.display_name(), "Update Service");

        let mut renamed = found.clone();
        renamed.enabled = false;
        renamed.update(&conn).unwrap();
        assert!(!ServiceRecord::list_all(&conn).unwrap()[0].enabled);

        assert!(ServiceRecord::delete(&conn, "updates").unwrap());
        assert!(ServiceRecord::list_all(&conn).unwrap().is_empty());
    }
}
