//! Principal directory: lookup of principals by identifier.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::Principal;

/// The directory could not answer. Carries no storage detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("principal directory unavailable")]
pub struct DirectoryError;

/// Read-only lookup the authentication core depends on.
///
/// `Ok(None)` is the explicit "not found". Implementations own
/// persistence; the core never writes through this trait.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_by_identifier(&self, id: &str) -> Result<Option<Principal>, DirectoryError>;
}

/// In-memory directory backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    principals: Arc<DashMap<String, Principal>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory holding `principals`. Later entries replace earlier
    /// ones with the same identifier.
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let directory = Self::new();
        for principal in principals {
            directory.upsert(principal);
        }
        directory
    }

    /// Insert a principal unless the identifier is taken.
    /// Returns false if a principal with that identifier already exists.
    pub fn insert(&self, principal: Principal) -> bool {
        use dashmap::mapref::entry::Entry;

        match self.principals.entry(principal.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(principal);
                true
            }
        }
    }

    /// Insert or replace a principal.
    pub fn upsert(&self, principal: Principal) -> Option<Principal> {
        self.principals.insert(principal.id().to_string(), principal)
    }

    pub fn remove(&self, id: &str) -> Option<Principal> {
        self.principals.remove(id).map(|(_, principal)| principal)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.principals.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryDirectory {
    async fn find_by_identifier(&self, id: &str) -> Result<Option<Principal>, DirectoryError> {
        Ok(self.principals.get(id).map(|entry| entry.value().clone()))
    }
}
