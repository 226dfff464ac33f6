//! Authentication middleware and authorization extractors.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::{AuthError, IdentityContext, InterceptorChain, Principal};

/// Identity middleware.
///
/// Runs the interceptor chain and stores the resulting [`IdentityContext`] in
/// the request extensions. A context already present (set by an outer layer)
/// is passed into the chain, so it is never overwritten. This layer never
/// rejects a request.
pub async fn identity_middleware(
    State(chain): State<Arc<InterceptorChain>>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = req
        .extensions_mut()
        .remove::<IdentityContext>()
        .unwrap_or_default();

    let (ctx, _) = chain.run(req.headers(), ctx).await;
    req.extensions_mut().insert(ctx);

    next.run(req).await
}

/// Authenticated principal extracted from request.
///
/// Rejects with 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Arc<Principal>);

impl Deref for CurrentPrincipal {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .and_then(|ctx| ctx.principal().cloned())
            .map(CurrentPrincipal)
            .ok_or(AuthError::Unauthenticated)
    }
}

/// A role a route demands.
pub trait RoleRequirement: Send + Sync + 'static {
    /// Role name, matched case-insensitively.
    const ROLE: &'static str;
}

/// Requires the `admin` role.
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl RoleRequirement for Admin {
    const ROLE: &'static str = "admin";
}

/// Require a role.
///
/// Use as an extractor in handlers that require a capability. Rejects with
/// 401 for anonymous requests and 403 when the role is missing.
#[derive(Debug, Clone)]
pub struct RequireRole<R: RoleRequirement> {
    pub principal: CurrentPrincipal,
    _role: PhantomData<R>,
}

impl<R: RoleRequirement> Deref for RequireRole<R> {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.principal
    }
}

impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    R: RoleRequirement,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = CurrentPrincipal::from_request_parts(parts, state).await?;

        if !principal.has_role(R::ROLE) {
            return Err(AuthError::InsufficientRoles(format!(
                "{} role required",
                R::ROLE
            )));
        }

        Ok(RequireRole {
            principal,
            _role: PhantomData,
        })
    }
}

/// Require admin role.
pub type RequireAdmin = RequireRole<Admin>;
