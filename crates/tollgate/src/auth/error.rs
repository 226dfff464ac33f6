//! Authentication errors.

use thiserror::Error;

/// Authentication errors.
///
/// None of these are fatal to the process. They end the current
/// authentication attempt only. The HTTP rendering lives with `ApiError`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be parsed, asserted the wrong algorithm, or failed
    /// signature verification.
    #[error("malformed token")]
    MalformedToken,

    /// Token signature is valid but the expiry has passed.
    #[error("token expired")]
    Expired,

    /// No principal with the given identifier.
    #[error("principal not found")]
    NotFound,

    /// Presented secret does not match the stored hash.
    #[error("bad credential")]
    BadCredential,

    /// Tokens cannot be minted for an empty subject.
    #[error("token subject must not be empty")]
    EmptySubject,

    /// The request carries no resolved identity.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal lacks a required role.
    #[error("insufficient roles: {0}")]
    InsufficientRoles(String),

    /// The principal directory could not answer.
    #[error("principal directory unavailable")]
    DirectoryUnavailable,

    /// Internal error.
    #[error("internal auth error: {0}")]
    Internal(String),
}
