//! Request-scoped identity.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::Principal;

/// The identity resolved for one request, or nothing (anonymous).
///
/// Created empty at the start of a request. Only the first writer sets it;
/// later writers are ignored, so interceptors can be chained freely.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    principal: Option<Arc<Principal>>,
}

impl IdentityContext {
    /// An empty context.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Populate the context if it is still empty.
    /// Returns false, leaving the context untouched, if it was already set.
    pub fn resolve(&mut self, principal: impl Into<Arc<Principal>>) -> bool {
        if self.principal.is_some() {
            return false;
        }
        self.principal = Some(principal.into());
        true
    }

    pub fn principal(&self) -> Option<&Arc<Principal>> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }
}

/// Never fails: a request without a context is anonymous.
impl<S> FromRequestParts<S> for IdentityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .unwrap_or_default())
    }
}
