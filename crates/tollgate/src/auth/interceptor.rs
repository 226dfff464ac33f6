//! Request identity interceptor.
//!
//! Turns an inbound bearer credential into a resolved [`IdentityContext`].
//! Runs once per request and never rejects the request itself; routes decide
//! downstream whether an anonymous caller is acceptable.
//!
//! ```text
//! START -> no credential ------------------------------> ANONYMOUS
//! START -> credential -> DECODING -> directory hit ----> AUTHENTICATED
//!                                 \-> any failure -----> REJECTED
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION};
use tracing::{debug, warn};

use super::{AuthError, IdentityContext, PrincipalDirectory, TokenCodec};

/// Literal scheme prefix in front of the token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from a `Bearer <token>` header value.
///
/// The prefix must match exactly; anything else counts as no credential.
pub fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let token = value.to_str().ok()?.strip_prefix(BEARER_PREFIX)?;
    if token.is_empty() { None } else { Some(token) }
}

/// Why a presented credential did not produce an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    Expired,
    UnknownPrincipal,
    DirectoryUnavailable,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed => write!(f, "malformed"),
            RejectReason::Expired => write!(f, "expired"),
            RejectReason::UnknownPrincipal => write!(f, "unknown_principal"),
            RejectReason::DirectoryUnavailable => write!(f, "directory_unavailable"),
        }
    }
}

/// Terminal state of one interceptor pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No credential was presented.
    Anonymous,
    /// The credential resolved to this principal.
    Authenticated(String),
    /// A credential was presented but did not resolve.
    Rejected(RejectReason),
    /// An earlier stage had already set the identity; nothing was done.
    AlreadyResolved,
}

/// One stage of identity resolution.
#[async_trait]
pub trait IdentityInterceptor: Send + Sync {
    /// Return `ctx`, populated if this stage can establish an identity.
    /// Must leave an already populated context untouched.
    async fn intercept(
        &self,
        headers: &HeaderMap,
        ctx: IdentityContext,
    ) -> (IdentityContext, Outcome);
}

/// Resolves `Bearer` tokens through the codec and the directory.
#[derive(Clone)]
pub struct BearerInterceptor {
    codec: Arc<TokenCodec>,
    directory: Arc<dyn PrincipalDirectory>,
    header: HeaderName,
}

impl fmt::Debug for BearerInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerInterceptor")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl BearerInterceptor {
    pub fn new(codec: Arc<TokenCodec>, directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            codec,
            directory,
            header: AUTHORIZATION,
        }
    }

    /// Read the credential from `header` instead of `Authorization`.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    async fn resolve(
        &self,
        headers: &HeaderMap,
        mut ctx: IdentityContext,
    ) -> (IdentityContext, Outcome) {
        let Some(token) = headers.get(&self.header).and_then(bearer_token) else {
            return (ctx, Outcome::Anonymous);
        };

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(AuthError::Expired) => return (ctx, Outcome::Rejected(RejectReason::Expired)),
            Err(_) => return (ctx, Outcome::Rejected(RejectReason::Malformed)),
        };

        let principal = match self.directory.find_by_identifier(claims.subject()).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                debug!(subject = %claims.sub, "token subject not in directory");
                return (ctx, Outcome::Rejected(RejectReason::UnknownPrincipal));
            }
            Err(e) => {
                warn!(subject = %claims.sub, error = %e, "directory lookup failed");
                return (ctx, Outcome::Rejected(RejectReason::DirectoryUnavailable));
            }
        };

        let id = principal.id().to_string();
        if ctx.resolve(principal) {
            (ctx, Outcome::Authenticated(id))
        } else {
            (ctx, Outcome::AlreadyResolved)
        }
    }
}

#[async_trait]
impl IdentityInterceptor for BearerInterceptor {
    async fn intercept(
        &self,
        headers: &HeaderMap,
        ctx: IdentityContext,
    ) -> (IdentityContext, Outcome) {
        if ctx.is_authenticated() {
            return (ctx, Outcome::AlreadyResolved);
        }

        let (ctx, outcome) = self.resolve(headers, ctx).await;
        match &outcome {
            Outcome::Rejected(reason) => debug!(%reason, "bearer credential rejected"),
            Outcome::Authenticated(id) => debug!(principal = %id, "bearer credential accepted"),
            _ => {}
        }
        (ctx, outcome)
    }
}

/// Interceptors applied in order. Each stage sees the context produced by
/// the previous one.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    stages: Vec<Arc<dyn IdentityInterceptor>>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn then(mut self, stage: impl IdentityInterceptor + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage and return the decorated context with each stage's
    /// outcome.
    pub async fn run(
        &self,
        headers: &HeaderMap,
        mut ctx: IdentityContext,
    ) -> (IdentityContext, Vec<Outcome>) {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let (next, outcome) = stage.intercept(headers, ctx).await;
            ctx = next;
            outcomes.push(outcome);
        }
        (ctx, outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DirectoryError, InMemoryDirectory, ManualClock, Principal};
    use secrecy::SecretString;
    use std::time::Duration;

    const KEY: &str = "test-secret-for-unit-tests-minimum-32-chars-long";
    const T0: i64 = 1_700_000_000;

    struct Fixture {
        interceptor: BearerInterceptor,
        codec: Arc<TokenCodec>,
        directory: InMemoryDirectory,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at(T0));
        let codec = Arc::new(TokenCodec::with_clock(&SecretString::from(KEY), clock.clone()));
        let directory = InMemoryDirectory::with_principals([
            Principal::new("alice", "hash", vec!["user".to_string()]),
            Principal::new("bob", "hash", vec!["user".to_string(), "admin".to_string()]),
        ]);
        let interceptor = BearerInterceptor::new(codec.clone(), Arc::new(directory.clone()));
        Fixture {
            interceptor,
            codec,
            directory,
            clock,
        }
    }

    fn headers_with(name: HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(token: &str) -> HeaderMap {
        headers_with(AUTHORIZATION, &format!("Bearer {token}"))
    }

    struct Unavailable;

    #[async_trait]
    impl PrincipalDirectory for Unavailable {
        async fn find_by_identifier(
            &self,
            _id: &str,
        ) -> Result<Option<Principal>, DirectoryError> {
            Err(DirectoryError)
        }
    }

    /// Authenticates every request as a fixed principal.
    struct Fixed(&'static str);

    #[async_trait]
    impl IdentityInterceptor for Fixed {
        async fn intercept(
            &self,
            _headers: &HeaderMap,
            mut ctx: IdentityContext,
        ) -> (IdentityContext, Outcome) {
            if ctx.resolve(Principal::new(self.0, "hash", Vec::<String>::new())) {
                (ctx, Outcome::Authenticated(self.0.to_string()))
            } else {
                (ctx, Outcome::AlreadyResolved)
            }
        }
    }

    #[test]
    fn test_bearer_token_valid() {
        let value = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&value), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_invalid() {
        let cases = ["", "Bearer", "Bearer ", "bearer abc", "Token abc", "Basic dXNlcjpwdw=="];
        for case in cases {
            let value = HeaderValue::from_str(case).unwrap();
            assert_eq!(bearer_token(&value), None, "{case:?} should not yield a token");
        }
    }

    #[test]
    fn test_bearer_token_non_utf8() {
        let value = HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap();
        assert_eq!(bearer_token(&value), None);
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let f = fixture();
        let issued = f.codec.mint("alice", Duration::from_secs(3600)).unwrap();

        let (ctx, outcome) = f
            .interceptor
            .intercept(&bearer(&issued.token), IdentityContext::anonymous())
            .await;

        assert_eq!(outcome, Outcome::Authenticated("alice".to_string()));
        assert_eq!(ctx.principal().unwrap().id(), "alice");
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let f = fixture();
        let (ctx, outcome) = f
            .interceptor
            .intercept(&HeaderMap::new(), IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Anonymous);
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_anonymous() {
        let f = fixture();
        let issued = f.codec.mint("alice", Duration::from_secs(3600)).unwrap();
        let headers = headers_with(AUTHORIZATION, &format!("Token {}", issued.token));

        let (ctx, outcome) = f
            .interceptor
            .intercept(&headers, IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Anonymous);
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let f = fixture();
        let (ctx, outcome) = f
            .interceptor
            .intercept(&bearer("garbage"), IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Rejected(RejectReason::Malformed));
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let f = fixture();
        let issued = f.codec.mint("alice", Duration::from_secs(60)).unwrap();
        f.clock.advance(61);

        let (ctx, outcome) = f
            .interceptor
            .intercept(&bearer(&issued.token), IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Rejected(RejectReason::Expired));
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_deleted_principal_rejected() {
        let f = fixture();
        let issued = f.codec.mint("bob", Duration::from_secs(3600)).unwrap();
        f.directory.remove("bob");

        let (ctx, outcome) = f
            .interceptor
            .intercept(&bearer(&issued.token), IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Rejected(RejectReason::UnknownPrincipal));
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_directory_failure_rejected() {
        let f = fixture();
        let interceptor = BearerInterceptor::new(f.codec.clone(), Arc::new(Unavailable));
        let issued = f.codec.mint("alice", Duration::from_secs(3600)).unwrap();

        let (ctx, outcome) = interceptor
            .intercept(&bearer(&issued.token), IdentityContext::anonymous())
            .await;
        assert_eq!(outcome, Outcome::Rejected(RejectReason::DirectoryUnavailable));
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_custom_header() {
        let f = fixture();
        let header = HeaderName::from_static("x-identity");
        let interceptor = f.interceptor.clone().with_header(header.clone());
        let issued = f.codec.mint("alice", Duration::from_secs(3600)).unwrap();

        let (ctx, _) = interceptor
            .intercept(&bearer(&issued.token), IdentityContext::anonymous())
            .await;
        assert!(ctx.is_anonymous());

        let headers = headers_with(header, &format!("Bearer {}", issued.token));
        let (ctx, _) = interceptor
            .intercept(&headers, IdentityContext::anonymous())
            .await;
        assert_eq!(ctx.principal().unwrap().id(), "alice");
    }

    #[tokio::test]
    async fn test_rerun_keeps_identity() {
        let f = fixture();
        let alice = f.codec.mint("alice", Duration::from_secs(3600)).unwrap();
        let bob = f.codec.mint("bob", Duration::from_secs(3600)).unwrap();

        let (ctx, _) = f
            .interceptor
            .intercept(&bearer(&alice.token), IdentityContext::anonymous())
            .await;

        let (ctx, outcome) = f.interceptor.intercept(&bearer(&alice.token), ctx).await;
        assert_eq!(outcome, Outcome::AlreadyResolved);
        assert_eq!(ctx.principal().unwrap().id(), "alice");

        let (ctx, outcome) = f.interceptor.intercept(&bearer(&bob.token), ctx).await;
        assert_eq!(outcome, Outcome::AlreadyResolved);
        assert_eq!(ctx.principal().unwrap().id(), "alice");

        let (ctx, _) = f.interceptor.intercept(&bearer("garbage"), ctx).await;
        assert_eq!(ctx.principal().unwrap().id(), "alice");
    }

    #[tokio::test]
    async fn test_chain_first_writer_wins() {
        let f = fixture();
        let issued = f.codec.mint("bob", Duration::from_secs(3600)).unwrap();

        let chain = InterceptorChain::new()
            .then(Fixed("service"))
            .then(f.interceptor.clone());
        assert_eq!(chain.len(), 2);

        let (ctx, outcomes) = chain
            .run(&bearer(&issued.token), IdentityContext::anonymous())
            .await;
        assert_eq!(ctx.principal().unwrap().id(), "service");
        assert_eq!(
            outcomes,
            vec![
                Outcome::Authenticated("service".to_string()),
                Outcome::AlreadyResolved
            ]
        );
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_later_stage() {
        let f = fixture();
        let chain = InterceptorChain::new()
            .then(f.interceptor.clone())
            .then(Fixed("fallback"));

        let (ctx, outcomes) = chain
            .run(&bearer("garbage"), IdentityContext::anonymous())
            .await;
        assert_eq!(ctx.principal().unwrap().id(), "fallback");
        assert_eq!(outcomes[0], Outcome::Rejected(RejectReason::Malformed));
    }
}
