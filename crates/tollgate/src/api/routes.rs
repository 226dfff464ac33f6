//! Router construction.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::identity_middleware;

use super::handlers;
use super::state::AppState;

/// Request bodies are small JSON documents.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Create the application router.
///
/// Identity resolution runs on every route, including the public ones; the
/// handlers decide through their extractors whether an identity is needed.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let interceptors = state.interceptors.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/demo", get(handlers::demo))
        .route("/admin_only", get(handlers::admin_only));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            interceptors,
            identity_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(trace_layer)
}
