//! Authentication module.
//!
//! Stateless bearer authentication:
//! - HS256 token minting and verification
//! - bcrypt secret verification against a principal directory
//! - per-request identity resolution as axum middleware
//! - role-gated extractors for downstream authorization

mod authenticator;
mod claims;
mod clock;
mod codec;
mod config;
mod context;
mod directory;
mod error;
mod interceptor;
mod middleware;
mod principal;

pub use authenticator::{Authenticator, hash_secret};
pub use claims::Claims;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{IssuedToken, MAX_TOKEN_LEN, TOKEN_ALGORITHM, TokenCodec};
pub use config::{
    AuthConfig, ConfigValidationError, DEFAULT_CREDENTIAL_HEADER, DEFAULT_TOKEN_TTL_SECS,
    MIN_SIGNING_KEY_LEN, SeedPrincipal,
};
pub use context::IdentityContext;
pub use directory::{DirectoryError, InMemoryDirectory, PrincipalDirectory};
pub use error::AuthError;
pub use interceptor::{
    BEARER_PREFIX, BearerInterceptor, IdentityInterceptor, InterceptorChain, Outcome,
    RejectReason, bearer_token,
};
pub use middleware::{
    Admin, CurrentPrincipal, RequireAdmin, RequireRole, RoleRequirement, identity_middleware,
};
pub use principal::{Principal, PrincipalInfo, RoleSet};
