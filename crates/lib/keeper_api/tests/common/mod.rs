//! Shared helpers for API integration tests.
//!
//! Tests run the real router against in-memory stores, so no database is
//! needed. bcrypt runs at its minimum cost to keep the suite fast.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use keeper_api::AppState;
use keeper_api::config::ApiConfig;
use keeper_core::auth::password::BcryptVerifier;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_secret: JWT_SECRET.into(),
        admin_users: Vec::new(),
    }
}

/// In-memory state plus the router built on it.
pub fn test_app() -> (AppState, Router) {
    let mut state = AppState::in_memory(test_config());
    state.credentials = Arc::new(BcryptVerifier::with_cost(4));
    let app = keeper_api::router(state.clone());
    (state, app)
}

/// Send a request and return the status with the parsed JSON body
/// (`Value::Null` when the body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, None, Some(body)).await
}

/// Register `username` with [`PASSWORD`] and return the user JSON.
pub async fn register(app: &Router, username: &str) -> Value {
    let (status, json) = post(
        app,
        "/users",
        json!({"username": username, "password": PASSWORD}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {username}: {json}");
    json
}

/// Log in and return the token JSON.
pub async fn login(app: &Router, username: &str) -> Value {
    let (status, json) = post(
        app,
        "/users/token",
        json!({"username": username, "password": PASSWORD}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {username}: {json}");
    json
}

/// Register and log in, returning the access token.
pub async fn access_token_for(app: &Router, username: &str) -> String {
    register(app, username).await;
    login(app, username).await["accessToken"]
        .as_str()
        .expect("accessToken")
        .to_string()
}
