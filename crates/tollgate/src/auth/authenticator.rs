//! Secret verification against the principal directory.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{AuthConfig, AuthError, Principal, PrincipalDirectory};

/// Hash a secret with bcrypt at the given cost.
pub fn hash_secret(secret: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(secret, cost).map_err(|e| AuthError::Internal(format!("hashing failed: {e}")))
}

/// Verifies presented secrets against stored bcrypt hashes.
///
/// Unknown identifiers are checked against a decoy hash of the same cost so
/// that `NotFound` and `BadCredential` cost the same amount of work.
#[derive(Clone)]
pub struct Authenticator {
    directory: Arc<dyn PrincipalDirectory>,
    decoy_hash: Arc<str>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Create an authenticator. Computes the decoy hash, so this blocks for
    /// one bcrypt round at `hash_cost`.
    pub fn new(directory: Arc<dyn PrincipalDirectory>, hash_cost: u32) -> Result<Self, AuthError> {
        // Random secret whose hash stands in for absent principals.
        let decoy = SecretString::from(AuthConfig::generate_signing_key());
        let decoy_hash = hash_secret(decoy.expose_secret(), hash_cost)?;

        Ok(Self {
            directory,
            decoy_hash: Arc::from(decoy_hash),
        })
    }

    /// Check `presented_secret` for `identifier`.
    ///
    /// Does not mint a token; callers hand the principal to the codec.
    #[instrument(skip(self, presented_secret))]
    pub async fn authenticate(
        &self,
        identifier: &str,
        presented_secret: &str,
    ) -> Result<Principal, AuthError> {
        let principal = self
            .directory
            .find_by_identifier(identifier)
            .await
            .map_err(|e| {
                warn!(error = %e, "directory lookup failed during authentication");
                AuthError::DirectoryUnavailable
            })?;

        let hash = match &principal {
            Some(p) => p.credential_hash().expose_secret().to_string(),
            None => self.decoy_hash.to_string(),
        };
        let secret = SecretString::from(presented_secret);
        let decoy = Arc::clone(&self.decoy_hash);
        let id = identifier.to_owned();

        let matched = tokio::task::spawn_blocking(move || {
            match bcrypt::verify(secret.expose_secret(), &hash) {
                Ok(matched) => matched,
                Err(e) => {
                    // An unreadable stored hash still costs one full round.
                    warn!(
                        principal = %id,
                        error = %e,
                        "stored credential hash is not valid bcrypt"
                    );
                    let _ = bcrypt::verify(secret.expose_secret(), &decoy);
                    false
                }
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?;

        match principal {
            None => {
                debug!("unknown identifier");
                Err(AuthError::NotFound)
            }
            Some(_) if !matched => {
                debug!("secret mismatch");
                Err(AuthError::BadCredential)
            }
            Some(principal) => {
                debug!(roles = %principal.roles(), "authenticated");
                Ok(principal)
            }
        }
    }
}
