//! Test utilities and common setup.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use tollgate::api::{AppState, create_router};
use tollgate::auth::{AuthConfig, ManualClock, SeedPrincipal, hash_secret};

pub const ADMIN_ID: &str = "root";
pub const ADMIN_SECRET: &str = "root-password";
pub const USER_ID: &str = "alice";
pub const USER_SECRET: &str = "alice-password";
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Fast bcrypt cost so tests stay quick.
const TEST_HASH_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

/// Create a test AuthConfig with a signing key and two seeded principals.
fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.signing_key = Some(SecretString::from(
        "test-secret-for-integration-tests-minimum-32-chars",
    ));
    config.token_ttl_secs = TOKEN_TTL_SECS;
    config.hash_cost = TEST_HASH_COST;
    config.principals = vec![
        SeedPrincipal {
            id: ADMIN_ID.to_string(),
            password_hash: hash_secret(ADMIN_SECRET, TEST_HASH_COST).unwrap(),
            roles: vec!["admin".to_string(), "user".to_string()],
        },
        SeedPrincipal {
            id: USER_ID.to_string(),
            password_hash: hash_secret(USER_SECRET, TEST_HASH_COST).unwrap(),
            roles: vec!["user".to_string()],
        },
    ];
    config
}

/// Create a test application driven by a manual clock.
pub fn test_app() -> TestApp {
    let clock = Arc::new(ManualClock::starting_now());
    let state = AppState::from_config_with_clock(&test_auth_config(), clock.clone()).unwrap();
    let router = create_router(state.clone());
    TestApp {
        router,
        state,
        clock,
    }
}

impl TestApp {
    /// Send a request and return status plus the raw response.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri).method(Method::GET);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        let request = Request::builder()
            .uri(uri)
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the issued token.
    pub async fn login(&self, identifier: &str, secret: &str) -> String {
        let response = self
            .post_json(
                "/auth/login",
                &serde_json::json!({ "identifier": identifier, "secret": secret }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        json["token"].as_str().unwrap().to_string()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
