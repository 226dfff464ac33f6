//! API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
                "Internal server error".to_string()
            }
            ApiError::ServiceUnavailable(msg) => {
                warn!(error_code = code, message = %msg, "Service unavailable");
                self.to_string()
            }
            _ => {
                tracing::debug!(error_code = code, message = %self, "Client error");
                self.to_string()
            }
        };

        (status, Json(ErrorResponse { error: message, code })).into_response()
    }
}

/// Convert auth errors to API errors.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            // One message for both, so responses do not reveal which
            // identifiers exist.
            AuthError::NotFound | AuthError::BadCredential => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::MalformedToken | AuthError::Expired | AuthError::Unauthenticated => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::EmptySubject => ApiError::BadRequest(err.to_string()),
            AuthError::InsufficientRoles(msg) => ApiError::Forbidden(msg),
            AuthError::DirectoryUnavailable => ApiError::ServiceUnavailable(err.to_string()),
            AuthError::Internal(msg) => {
                ApiError::Internal(format!("Authentication error: {}", msg))
            }
        }
    }
}

/// Extractor rejections render through [`ApiError`], so every error body has
/// the same shape.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
