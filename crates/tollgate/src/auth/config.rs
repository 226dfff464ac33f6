//! Authentication configuration.

use std::fmt;
use std::time::Duration;

use axum::http::HeaderName;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::{Principal, RoleSet};

/// Minimum signing key length in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60 * 24;

/// Accepted bcrypt cost range.
const HASH_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Default header carrying the bearer credential.
pub const DEFAULT_CREDENTIAL_HEADER: &str = "authorization";

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Symmetric key for HS256 signing. REQUIRED.
    /// Accepts `env:VAR_NAME` to read the key from the environment.
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub signing_key: Option<SecretString>,

    /// Lifetime of minted tokens, in seconds.
    pub token_ttl_secs: u64,

    /// Request header that carries `Bearer <token>`.
    pub header: String,

    /// bcrypt cost for new hashes and the decoy hash.
    pub hash_cost: u32,

    /// Principals loaded into the in-memory directory at startup.
    pub principals: Vec<SeedPrincipal>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default signing key - must be explicitly configured
            signing_key: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            hash_cost: bcrypt::DEFAULT_COST,
            principals: Vec::new(),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl AuthConfig {
    /// Resolve the signing key, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved key or None if not configured.
    pub fn resolve_signing_key(&self) -> Result<Option<SecretString>, ConfigValidationError> {
        let Some(value) = &self.signing_key else {
            return Ok(None);
        };

        match value.expose_secret().strip_prefix("env:") {
            Some(var_name) => match std::env::var(var_name) {
                Ok(secret) if !secret.is_empty() => Ok(Some(SecretString::from(secret))),
                Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
            },
            None => Ok(Some(value.clone())),
        }
    }

    /// Resolve and check the signing key. Serving without one is not allowed.
    pub fn require_signing_key(&self) -> Result<SecretString, ConfigValidationError> {
        let key = self
            .resolve_signing_key()?
            .ok_or(ConfigValidationError::MissingSigningKey)?;

        if key.expose_secret().len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigValidationError::SigningKeyTooShort);
        }

        Ok(key)
    }

    /// Token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Parsed credential header name.
    pub fn header_name(&self) -> Result<HeaderName, ConfigValidationError> {
        HeaderName::from_bytes(self.header.trim().as_bytes())
            .map_err(|_| ConfigValidationError::InvalidHeader(self.header.clone()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.require_signing_key()?;

        if self.token_ttl_secs == 0 {
            return Err(ConfigValidationError::ZeroTokenTtl);
        }

        self.header_name()?;

        if !HASH_COST_RANGE.contains(&self.hash_cost) {
            return Err(ConfigValidationError::InvalidHashCost(self.hash_cost));
        }

        for seed in &self.principals {
            if seed.password_hash.parse::<bcrypt::HashParts>().is_err() {
                return Err(ConfigValidationError::InvalidPasswordHash(seed.id.clone()));
            }
        }

        Ok(())
    }

    /// Generate a random signing key.
    ///
    /// 48 bytes from the OS-seeded thread RNG, base64url encoded (64 chars).
    pub fn generate_signing_key() -> String {
        use rand::RngCore;

        let mut bytes = [0u8; 48];
        rand::rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error(
        "signing key is required. Set TOLLGATE__AUTH__SIGNING_KEY or auth.signing_key in config."
    )]
    MissingSigningKey,

    #[error("signing key must be at least {} bytes long.", MIN_SIGNING_KEY_LEN)]
    SigningKeyTooShort,

    #[error("environment variable '{0}' not found (referenced via env:{0} in config).")]
    EnvVarNotFound(String),

    #[error("environment variable '{0}' is empty (referenced via env:{0} in config).")]
    EnvVarEmpty(String),

    #[error("token_ttl_secs must be greater than zero.")]
    ZeroTokenTtl,

    #[error("'{0}' is not a valid header name.")]
    InvalidHeader(String),

    #[error("hash_cost {0} is outside the bcrypt range 4..=31.")]
    InvalidHashCost(u32),

    #[error("password_hash for principal '{0}' is not a bcrypt hash.")]
    InvalidPasswordHash(String),
}

/// Principal entry in configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SeedPrincipal {
    /// Identifier.
    pub id: String,
    /// Password hash (bcrypt).
    pub password_hash: String,
    /// Granted roles.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl fmt::Debug for SeedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedPrincipal")
            .field("id", &self.id)
            .field("password_hash", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

impl From<SeedPrincipal> for Principal {
    fn from(seed: SeedPrincipal) -> Self {
        Principal::new(seed.id, seed.password_hash, RoleSet::from(seed.roles))
    }
}
