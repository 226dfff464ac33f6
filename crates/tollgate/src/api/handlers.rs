//! HTTP handlers composing the authentication core.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::{
    BEARER_PREFIX, CurrentPrincipal, IssuedToken, Principal, PrincipalInfo, RequireAdmin,
    hash_secret,
};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Role granted to self-registered principals.
pub const DEFAULT_ROLE: &str = "user";

/// Minimum length of a secret accepted at registration.
pub const MIN_SECRET_LEN: usize = 8;

/// Health status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub secret: String,
}

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub identifier: String,
    pub secret: String,
}

/// Token issued after login or registration.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub principal: PrincipalInfo,
}

impl TokenResponse {
    fn new(issued: IssuedToken, principal: &Principal) -> Self {
        Self {
            token: issued.token,
            token_type: BEARER_PREFIX.trim_end(),
            expires_at: issued.expires_at,
            principal: principal.info(),
        }
    }
}

/// Exchange an identifier and secret for a token.
#[instrument(skip(state, request), fields(identifier = %request.identifier))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let principal = state
        .authenticator
        .authenticate(&request.identifier, &request.secret)
        .await?;

    let issued = state.codec.mint(principal.id(), state.token_ttl)?;
    info!(principal = %principal.id(), "login succeeded");

    Ok(Json(TokenResponse::new(issued, &principal)))
}

/// Register a new principal and return a token for it.
#[instrument(skip(state, request), fields(identifier = %request.identifier))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !is_valid_identifier(&request.identifier) {
        return Err(ApiError::bad_request(
            "Invalid identifier. Must be 3-64 characters: letters, digits, '_', '-', '.', '@'.",
        ));
    }
    if request.secret.chars().count() < MIN_SECRET_LEN {
        return Err(ApiError::bad_request(format!(
            "Secret must be at least {MIN_SECRET_LEN} characters."
        )));
    }
    if state.directory.contains(&request.identifier) {
        return Err(ApiError::conflict(format!(
            "Identifier '{}' is already registered.",
            request.identifier
        )));
    }

    let cost = state.hash_cost;
    let secret = request.secret;
    let hash = tokio::task::spawn_blocking(move || hash_secret(&secret, cost))
        .await
        .map_err(|e| ApiError::internal(format!("hashing task failed: {e}")))??;

    let principal = Principal::new(request.identifier, hash, vec![DEFAULT_ROLE.to_string()]);
    if !state.directory.insert(principal.clone()) {
        return Err(ApiError::conflict(format!(
            "Identifier '{}' is already registered.",
            principal.id()
        )));
    }

    let issued = state.codec.mint(principal.id(), state.token_ttl)?;
    info!(principal = %principal.id(), "registered principal");

    Ok((StatusCode::CREATED, Json(TokenResponse::new(issued, &principal))))
}

/// Get current principal info.
pub async fn me(principal: CurrentPrincipal) -> Json<PrincipalInfo> {
    Json(principal.info())
}

/// Any authenticated principal.
pub async fn demo(_principal: CurrentPrincipal) -> &'static str {
    "Hello World"
}

/// Principals holding the admin role only.
pub async fn admin_only(_admin: RequireAdmin) -> &'static str {
    "Admin"
}

/// Validate identifier format.
fn is_valid_identifier(identifier: &str) -> bool {
    let len = identifier.len();
    if !(3..=64).contains(&len) {
        return false;
    }

    identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
}
