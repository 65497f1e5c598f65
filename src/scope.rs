//! Scope keys identifying cached lists.
//!
//! A scope key is an entity kind plus the parameters that disambiguate one
//! list of that kind, e.g. `tasks?workspace=ws1` or
//! `tasks?tag=bug&workspace=ws1`. Parameters are kept sorted so that the
//! textual form is canonical.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::{Error, Result};

/// Parameter naming the workspace a list belongs to
pub const WORKSPACE_PARAM: &str = "workspace";

/// Parameter restricting a task list to one tag
pub const TAG_PARAM: &str = "tag";

/// Identifier of one cached ordered list
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeKey {
    kind: EntityKind,
    params: BTreeMap<String, String>,
}

impl ScopeKey {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// All workspaces in the sidebar
    pub fn workspaces() -> Self {
        Self::new(EntityKind::Workspace)
    }

    /// Columns of one workspace board
    pub fn columns(workspace: impl Into<String>) -> Self {
        Self::new(EntityKind::Column).with(WORKSPACE_PARAM, workspace)
    }

    /// Tasks across every column of one workspace
    pub fn tasks(workspace: impl Into<String>) -> Self {
        Self::new(EntityKind::Task).with(WORKSPACE_PARAM, workspace)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn workspace(&self) -> Option<&str> {
        self.param(WORKSPACE_PARAM)
    }

    /// Prefix matching exactly this key's kind and parameters
    pub fn as_prefix(&self) -> ScopePrefix {
        ScopePrefix {
            kind: self.kind,
            params: self.params.clone(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.plural())?;
        for (idx, (key, value)) in self.params.iter().enumerate() {
            let sep = if idx == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for ScopeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::InvalidScope("scope cannot be empty".to_string()));
        }
        let (kind_part, query) = match raw.split_once('?') {
            Some((kind, query)) => (kind, Some(query)),
            None => (raw, None),
        };
        let kind: EntityKind = kind_part
            .parse()
            .map_err(|_| Error::InvalidScope(format!("unknown kind in '{raw}'")))?;
        let mut key = ScopeKey::new(kind);
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| Error::InvalidScope(format!("expected key=value in '{raw}'")))?;
                if name.is_empty() || value.is_empty() {
                    return Err(Error::InvalidScope(format!(
                        "empty parameter in '{raw}'"
                    )));
                }
                if key.params.insert(name.to_string(), value.to_string()).is_some() {
                    return Err(Error::InvalidScope(format!(
                        "parameter '{name}' repeated in '{raw}'"
                    )));
                }
            }
        }
        Ok(key)
    }
}

impl TryFrom<String> for ScopeKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ScopeKey> for String {
    fn from(key: ScopeKey) -> Self {
        key.to_string()
    }
}

/// Selects every scope key of a kind whose parameters include all of
/// the prefix parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePrefix {
    kind: EntityKind,
    params: BTreeMap<String, String>,
}

impl ScopePrefix {
    pub fn kind(kind: EntityKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, key: &ScopeKey) -> bool {
        key.kind == self.kind
            && self
                .params
                .iter()
                .all(|(name, value)| key.params.get(name) == Some(value))
    }
}

impl From<EntityKind> for ScopePrefix {
    fn from(kind: EntityKind) -> Self {
        ScopePrefix::kind(kind)
    }
}

impl From<&ScopeKey> for ScopePrefix {
    fn from(key: &ScopeKey) -> Self {
        key.as_prefix()
    }
}
