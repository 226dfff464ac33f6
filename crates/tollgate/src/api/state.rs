//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::{
    AuthConfig, Authenticator, BearerInterceptor, Clock, InMemoryDirectory, InterceptorChain,
    Principal, PrincipalDirectory, SystemClock, TokenCodec,
};

/// Application state shared across handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Token minting and verification.
    pub codec: Arc<TokenCodec>,
    /// Secret verification.
    pub authenticator: Authenticator,
    /// Principal store used by registration.
    pub directory: InMemoryDirectory,
    /// Identity resolution run on every request.
    pub interceptors: Arc<InterceptorChain>,
    /// Lifetime of minted tokens.
    pub token_ttl: Duration,
    /// bcrypt cost for newly registered principals.
    pub hash_cost: u32,
}

impl AppState {
    /// Build state from validated configuration with the wall clock.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    /// Build state from configuration, reading time from `clock`.
    ///
    /// Fails when the configuration is invalid; the server must not start
    /// without a usable signing key.
    pub fn from_config_with_clock(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().context("invalid auth configuration")?;

        let signing_key = config.require_signing_key()?;
        let codec = Arc::new(TokenCodec::with_clock(&signing_key, clock));

        let directory = InMemoryDirectory::with_principals(
            config.principals.iter().cloned().map(Principal::from),
        );
        info!(principals = directory.len(), "loaded principal directory");

        let shared: Arc<dyn PrincipalDirectory> = Arc::new(directory.clone());
        let authenticator = Authenticator::new(shared.clone(), config.hash_cost)
            .context("initializing authenticator")?;

        let bearer = BearerInterceptor::new(codec.clone(), shared)
            .with_header(config.header_name()?);
        let interceptors = Arc::new(InterceptorChain::new().then(bearer));

        Ok(Self {
            codec,
            authenticator,
            directory,
            interceptors,
            token_ttl: config.token_ttl(),
            hash_cost: config.hash_cost,
        })
    }
}
