//! JWT claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal identifier).
    pub sub: String,

    /// Issued at (as Unix timestamp).
    pub iat: i64,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// The principal identifier this token asserts.
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// Whether the token is still valid at `now`. Valid iff `now < exp`.
    pub fn is_live_at(&self, now: i64) -> bool {
        now < self.exp
    }

    /// Issued-at as a timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
