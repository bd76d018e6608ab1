//! Request types - scope selection and merge requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RetrievalError, Result};

/// The entity (company) a query is restricted to.
///
/// Always an exact name picked from an enumerated list; the engine never
/// infers a scope from free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Wrap an already-selected entity name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// True if a passage tag belongs to this scope (exact match).
    pub fn matches(&self, tag: &str) -> bool {
        self.0 == tag
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The enumerated list of known entities a caller chooses a [`Scope`] from.
#[derive(Debug, Clone, Default)]
pub struct ScopeCatalog {
    names: Vec<String>,
}

impl ScopeCatalog {
    /// Build from a list of entity names (deduplicated, blanks dropped).
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.trim().is_empty())
            .collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    /// All known entity names, sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Select a scope by exact name.
    pub fn select(&self, name: &str) -> Result<Scope> {
        if self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok() {
            Ok(Scope::new(name))
        } else {
            Err(RetrievalError::invalid(format!(
                "unknown scope {:?} (not in catalog of {} entities)",
                name,
                self.names.len()
            )))
        }
    }
}

/// One merge request: a query, its scope and the per-source quotas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub scope: Scope,
    /// Upper bound on internal results.
    pub internal_k: usize,
    /// Upper bound on external results.
    pub external_k: usize,
    /// URLs the caller has already seen; dropped from the external contribution.
    #[serde(default)]
    pub exclude_urls: Vec<String>,
}

impl RetrievalRequest {
    /// Create a request with the default 3:7 quota split.
    pub fn new(query: impl Into<String>, scope: impl Into<Scope>) -> Self {
        Self {
            query: query.into(),
            scope: scope.into(),
            internal_k: 3,
            external_k: 7,
            exclude_urls: Vec::new(),
        }
    }

    /// Set both quotas.
    pub fn with_quota(mut self, internal_k: usize, external_k: usize) -> Self {
        self.internal_k = internal_k;
        self.external_k = external_k;
        self
    }

    /// Add URLs to exclude from the external contribution.
    pub fn excluding(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::invalid("query is empty"));
        }
        if self.scope.is_empty() {
            return Err(RetrievalError::invalid("scope is empty"));
        }
        if self.internal_k == 0 {
            return Err(RetrievalError::invalid("internal_k must be > 0"));
        }
        if self.external_k == 0 {
            return Err(RetrievalError::invalid("external_k must be > 0"));
        }
        Ok(())
    }
}
