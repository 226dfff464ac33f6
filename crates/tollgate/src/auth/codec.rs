//! Credential codec: mints and verifies HS256 tokens.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{AuthError, Claims, Clock, SystemClock};

/// The only algorithm this codec signs with or accepts.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Tokens longer than this are rejected before any parsing.
pub const MAX_TOKEN_LEN: usize = 8 * 1024;

/// A freshly minted token.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints and verifies signed, time-bounded tokens.
///
/// Holds a single symmetric key. Cheap to share behind an `Arc`; all state is
/// read-only after construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &TOKEN_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec using the wall clock.
    pub fn new(signing_key: &SecretString) -> Self {
        Self::with_clock(signing_key, Arc::new(SystemClock))
    }

    /// Create a codec reading time from `clock`.
    pub fn with_clock(signing_key: &SecretString, clock: Arc<dyn Clock>) -> Self {
        let key = signing_key.expose_secret().as_bytes();

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // Expiry is checked here against a single clock reading.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            clock,
        }
    }

    /// Mint a token for `subject` valid for `ttl` from now.
    pub fn mint(&self, subject: &str, ttl: Duration) -> Result<IssuedToken, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::EmptySubject);
        }

        let now = self.clock.now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        debug!(subject, exp = claims.exp, "minted token");

        Ok(IssuedToken {
            token,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        })
    }

    /// Verify a token's signature and expiry and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::MalformedToken);
        }

        let now = self.clock.now().timestamp();

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(kind = ?e.kind(), "token rejected");
            AuthError::MalformedToken
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MalformedToken);
        }
        if !claims.is_live_at(now) {
            debug!(subject = %claims.sub, exp = claims.exp, now, "token expired");
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}
