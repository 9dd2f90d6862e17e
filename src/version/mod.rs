// src/version/mod.rs

//! Edition comparison and capability matching
//!
//! Resolvables carry RPM-style editions (`[epoch:]version[-release]`).
//! Comparison follows the rpmvercmp segment rules: alphanumeric segments
//! are compared pairwise, numeric segments numerically, and a numeric
//! segment is newer than an alphabetic one. A `~` sorts before anything,
//! so `1.0~rc1` is older than `1.0`.
//!
//! Capabilities (`name`, `name >= 1.2`, `name = 2:1.0-3`) are what
//! `install`, `what-provides` and patch constraints are written in.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A parsed edition with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edition {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Edition {
    /// Parse an edition string
    ///
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3-4.el8" → epoch=2, version="1.2.3", release=Some("4.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (epoch, rest) = match s.split_once(':') {
            Some(("", rest)) => (0, rest),
            Some((e, rest)) => {
                let epoch = e.parse::<u64>().map_err(|err| {
                    Error::ParseError(format!("Invalid epoch in edition '{}': {}", s, err))
                })?;
                (epoch, rest)
            }
            None => (0, s),
        };

        // Release is everything after the last dash
        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two editions
    ///
    /// A missing release on either side compares equal, so `>= 1.0`
    /// matches `1.0-5`.
    pub fn compare(&self, other: &Edition) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => compare_segments(a, b),
                _ => Ordering::Equal,
            })
    }
}

/// rpmvercmp-style comparison of a single version or release string
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut a = a.as_bytes();
    let mut b = b.as_bytes();

    loop {
        // Separators carry no ordering weight, except tilde
        while let Some((&c, rest)) = a.split_first() {
            if c.is_ascii_alphanumeric() || c == b'~' {
                break;
            }
            a = rest;
        }
        while let Some((&c, rest)) = b.split_first() {
            if c.is_ascii_alphanumeric() || c == b'~' {
                break;
            }
            b = rest;
        }

        match (a.first(), b.first()) {
            (Some(b'~'), Some(b'~')) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (Some(b'~'), _) => return Ordering::Less,
            (_, Some(b'~')) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            _ => {}
        }

        let numeric = a[0].is_ascii_digit();
        let take = |s: &[u8]| {
            s.iter()
                .take_while(|c| {
                    if numeric {
                        c.is_ascii_digit()
                    } else {
                        c.is_ascii_alphabetic()
                    }
                })
                .count()
        };
        let (seg_a, rest_a) = a.split_at(take(a));
        let (seg_b, rest_b) = b.split_at(take(b));

        if seg_b.is_empty() {
            // Segment types differ: numbers are newer than letters
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let trim = |s: &[u8]| {
                let zeros = s.iter().take_while(|&&c| c == b'0').count();
                s[zeros..].to_vec()
            };
            let (na, nb) = (trim(seg_a), trim(seg_b));
            na.len().cmp(&nb.len()).then_with(|| na.cmp(&nb))
        } else {
            seg_a.cmp(seg_b)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        a = rest_a;
        b = rest_b;
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for Edition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Edition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Relational operator of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Any,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Relation {
    fn symbol(self) -> &'static str {
        match self {
            Relation::Any => "",
            Relation::Equal => "=",
            Relation::NotEqual => "!=",
            Relation::Less => "<",
            Relation::LessOrEqual => "<=",
            Relation::Greater => ">",
            Relation::GreaterOrEqual => ">=",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Relation::Any => true,
            Relation::Equal => ord == Ordering::Equal,
            Relation::NotEqual => ord != Ordering::Equal,
            Relation::Less => ord == Ordering::Less,
            Relation::LessOrEqual => ord != Ordering::Greater,
            Relation::Greater => ord == Ordering::Greater,
            Relation::GreaterOrEqual => ord != Ordering::Less,
        }
    }
}

/// A named capability with an optional edition constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub relation: Relation,
    pub edition: Option<Edition>,
}

impl Capability {
    /// Parse `name`, `name op edition` or `name<op>edition`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty capability".to_string()));
        }

        // Longest operators first so ">=" is not read as ">"
        const OPERATORS: [(&str, Relation); 6] = [
            (">=", Relation::GreaterOrEqual),
            ("<=", Relation::LessOrEqual),
            ("!=", Relation::NotEqual),
            (">", Relation::Greater),
            ("<", Relation::Less),
            ("=", Relation::Equal),
        ];

        let Some(pos) = s.find(['<', '>', '=', '!']) else {
            return Ok(Self::named(s));
        };

        let (name, rest) = s.split_at(pos);
        let name = name.trim();
        for (symbol, relation) in OPERATORS {
            if let Some(edition) = rest.strip_prefix(symbol) {
                if name.is_empty() {
                    break;
                }
                return Ok(Self {
                    name: name.to_string(),
                    relation,
                    edition: Some(Edition::parse(edition)?),
                });
            }
        }

        Err(Error::ParseError(format!("Invalid capability '{}'", s)))
    }

    /// Capability matching any edition of `name`
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            relation: Relation::Any,
            edition: None,
        }
    }

    /// Whether `edition` of a resolvable named `name` satisfies this capability
    pub fn matches(&self, name: &str, edition: &Edition) -> bool {
        if self.name != name {
            return false;
        }
        match &self.edition {
            None => true,
            Some(wanted) => self.relation.holds(edition.compare(wanted)),
        }
    }

    /// Whether a provided capability (possibly versioned) satisfies this one
    pub fn is_satisfied_by(&self, provided: &Capability) -> bool {
        if self.name != provided.name {
            return false;
        }
        match (&self.edition, &provided.edition) {
            (None, _) => true,
            // An unversioned provide satisfies only unversioned requests
            (Some(_), None) => false,
            (Some(_), Some(have)) => self.matches(&provided.name, have),
        }
    }

    /// Whether some edition satisfies both capabilities
    ///
    /// Used to match a queried capability against requires and conflicts,
    /// which are ranges rather than concrete editions.
    pub fn overlaps(&self, other: &Capability) -> bool {
        if self.name != other.name {
            return false;
        }
        let (Some(a), Some(b)) = (&self.edition, &other.edition) else {
            return true;
        };

        // Each sample edition as its ordering against (a, b)
        let mut samples = vec![
            (Ordering::Equal, a.compare(b)),
            (b.compare(a), Ordering::Equal),
            (Ordering::Less, Ordering::Less),
            (Ordering::Greater, Ordering::Greater),
        ];
        match a.compare(b) {
            Ordering::Less => samples.push((Ordering::Greater, Ordering::Less)),
            Ordering::Greater => samples.push((Ordering::Less, Ordering::Greater)),
            Ordering::Equal => {}
        }
        samples
            .into_iter()
            .any(|(to_a, to_b)| self.relation.holds(to_a) && other.relation.holds(to_b))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.edition {
            Some(edition) => write!(f, "{} {} {}", self.name, self.relation.symbol(), edition),
            None => write!(f, "{}", self.name),
        }
    }
}
