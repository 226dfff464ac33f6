//! Principals and their role sets.

use std::collections::BTreeSet;
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Set of granted roles.
///
/// Role names are trimmed and lowercased on insertion, so lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role. Blank names are ignored.
    pub fn insert(&mut self, role: impl AsRef<str>) -> bool {
        let role = normalize(role.as_ref());
        if role.is_empty() {
            return false;
        }
        self.0.insert(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(&normalize(role))
    }

    /// True when at least one of `roles` is granted.
    pub fn contains_any<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        roles.into_iter().any(|r| self.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn normalize(role: &str) -> String {
    role.trim().to_lowercase()
}

impl<S: AsRef<str>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.into_iter().collect()
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(roles: RoleSet) -> Self {
        roles.0.into_iter().collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}

/// A known identity: identifier, stored credential hash, and granted roles.
///
/// The credential hash is opaque. It is redacted in `Debug` output and is
/// never serialized.
#[derive(Debug, Clone)]
pub struct Principal {
    id: String,
    credential_hash: SecretString,
    roles: RoleSet,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        credential_hash: impl Into<String>,
        roles: impl Into<RoleSet>,
    ) -> Self {
        Self {
            id: id.into(),
            credential_hash: SecretString::from(credential_hash.into()),
            roles: roles.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn credential_hash(&self) -> &SecretString {
        &self.credential_hash
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Client-safe view.
    pub fn info(&self) -> PrincipalInfo {
        PrincipalInfo {
            id: self.id.clone(),
            roles: self.roles.iter().map(str::to_string).collect(),
        }
    }
}

/// Public principal info (safe to return to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub id: String,
    pub roles: Vec<String>,
}
