// src/repository/locator.rs

//! Resolve user-supplied selectors to repository and service records
//!
//! A selector is an alias, a 1-based position in the current enumeration
//! order, or a URI. Precedence is alias, then position, then URI, each
//! tried across the whole list before the next kind is considered. Lookup
//! misses and malformed URIs are ordinary non-matches, never errors.

use crate::db::models::{RepositoryRecord, ServiceRecord, urls_equal};
use url::Url;

/// Anything a selector can be resolved against
pub trait Locatable {
    fn alias(&self) -> &str;
    fn matches_url(&self, url: &Url) -> bool;
    /// Whether two records reach the same underlying source
    fn same_source(&self, other: &Self) -> bool;
}

impl Locatable for RepositoryRecord {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn matches_url(&self, url: &Url) -> bool {
        self.base_urls.iter().any(|u| urls_equal(u, url))
    }

    fn same_source(&self, other: &Self) -> bool {
        self.same_base_urls(other)
    }
}

impl Locatable for ServiceRecord {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn matches_url(&self, url: &Url) -> bool {
        urls_equal(&self.url, url)
    }

    fn same_source(&self, other: &Self) -> bool {
        urls_equal(&self.url, &other.url)
    }
}

/// Resolve one selector against `known`, in enumeration order
pub fn locate<'a, T: Locatable>(token: &str, known: &'a [T]) -> Option<&'a T> {
    if let Some(found) = known.iter().find(|r| r.alias() == token) {
        return Some(found);
    }

    if let Ok(position) = token.parse::<usize>()
        && position >= 1
        && let Some(found) = known.get(position - 1)
    {
        return Some(found);
    }

    let url = Url::parse(token).ok()?;
    known.iter().find(|r| r.matches_url(&url))
}

/// Result of resolving several selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T> {
    /// Matched records in selector order, without duplicates
    pub matched: Vec<T>,
    /// Selectors that matched nothing, in input order
    pub unmatched: Vec<String>,
}

impl<T> Default for Located<T> {
    fn default() -> Self {
        Self {
            matched: Vec::new(),
            unmatched: Vec::new(),
        }
    }
}

/// Resolve several selectors
///
/// Two matches are duplicates when they share an alias or their complete
/// base URI sets are identical; only the first is kept.
pub fn locate_many<T, I, S>(tokens: I, known: &[T]) -> Located<T>
where
    T: Locatable + Clone,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = Located::default();

    for token in tokens {
        let token = token.as_ref();
        match locate(token, known) {
            Some(found) => {
                let duplicate = result
                    .matched
                    .iter()
                    .any(|m: &T| m.alias() == found.alias() || m.same_source(found));
                if !duplicate {
                    result.matched.push(found.clone());
                }
            }
            None => {
                if !result.unmatched.iter().any(|u| u == token) {
                    result.unmatched.push(token.to_string());
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(alias: &str, urls: &[&str]) -> RepositoryRecord {
        RepositoryRecord::new(alias, urls.iter().map(|u| Url::parse(u).unwrap()).collect())
    }

    fn known() -> Vec<RepositoryRecord> {
        vec![
            repo("repoA", &["http://a.example.com/repo"]),
            repo("repoB", &["http://b.example.com/repo", "ftp://mirror.example.com/b"]),
            repo("3", &["http://c.example.com/repo"]),
        ]
    }

    #[test]
    fn test_locate_by_alias() {
        let repos = known();
        assert_eq!(locate("repoB", &repos).unwrap().alias, "repoB");
    }

    #[test]
    fn test_locate_by_position() {
        let repos = known();
        for (i, expected) in repos.iter().enumerate() {
            let token = (i + 1).to_string();
            // alias "3" wins over position 3, which is the same record here
            assert_eq!(locate(&token, &repos).unwrap(), expected);
        }
        assert!(locate("0", &repos).is_none());
        assert!(locate("4", &repos).is_none());
    }

    #[test]
    fn test_alias_takes_precedence_over_position() {
        let repos = vec![
            repo("2", &["http://x.example.com/"]),
            repo("other", &["http://y.example.com/"]),
        ];
        assert_eq!(locate("2", &repos).unwrap().alias, "2");
    }

    #[test]
    fn test_locate_by_any_base_url() {
        let repos = known();
        assert_eq!(
            locate("ftp://mirror.example.com/b", &repos).unwrap().alias,
            "repoB"
        );
        assert_eq!(
            locate("http://a.example.com/repo/", &repos).unwrap().alias,
            "repoA"
        );
    }

    #[test]
    fn test_malformed_and_unknown_tokens() {
        let repos = known();
        assert!(locate("http://[::1", &repos).is_none());
        assert!(locate("no such repo", &repos).is_none());
        assert!(locate("", &repos).is_none());
        assert!(locate::<RepositoryRecord>("1", &[]).is_none());
    }

    #[test]
    fn test_locate_many_dedups_by_alias() {
        let repos = known();
        let found = locate_many(["repoA", "1", "http://a.example.com/repo"], &repos);
        assert_eq!(found.matched.len(), 1);
        assert!(found.unmatched.is_empty());
    }

    #[test]
    fn test_locate_many_dedups_by_url_set() {
        let repos = vec![
            repo("first", &["http://same.example.com/", "http://mirror.example.com/"]),
            repo("second", &["http://mirror.example.com/", "http://same.example.com/"]),
            repo("third", &["http://same.example.com/"]),
        ];
        let found = locate_many(["first", "second", "third"], &repos);
        let aliases: Vec<_> = found.matched.iter().map(|r| r.alias.as_str()).collect();
        assert_eq!(aliases, vec!["first", "third"]);
    }

    #[test]
    fn test_locate_many_collects_unmatched() {
        let repos = known();
        let found = locate_many(["repoX", "2", "repoX", "99"], &repos);
        assert_eq!(found.matched.len(), 1);
        assert_eq!(found.unmatched, vec!["repoX", "99"]);
    }

    #[test]
    fn test_locate_service() {
        let services = vec![
            ServiceRecord::new("svc", Url::parse("https://svc.example.com/").unwrap()),
            ServiceRecord::new("other", Url::parse("https://other.example.com/").unwrap()),
        ];
        assert_eq!(locate("2", &services).unwrap().alias, "other");
        assert_eq!(locate("https://svc.example.com", &services).unwrap().alias, "svc");
        assert!(locate("missing", &services).is_none());
    }
}
