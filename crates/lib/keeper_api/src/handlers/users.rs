//! Account and token request handlers.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    ExternalUserInfo, LogoutResponse, RefreshRequest, TokenResponse, UserCredentials,
    UserResponse,
};
use crate::services::auth;

/// `POST /users`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<UserCredentials>,
) -> AppResult<Json<UserResponse>> {
    let resp = auth::register(&state, &body.username, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /users/token`: authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<UserCredentials>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&state, &body.username, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /users/token/{provider}`: issue tokens for an external identity.
pub async fn external_login_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(body): Json<ExternalUserInfo>,
) -> AppResult<Json<TokenResponse>> {
    let resp =
        auth::external_login(&state, &provider, &body.username, &body.provider_key).await?;
    Ok(Json(resp))
}

/// `POST /users/refreshToken`: exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state, &body.token).await?;
    Ok(Json(resp))
}

/// `POST /users/logout`: revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<LogoutResponse>> {
    let resp = auth::logout(&state, &body.token).await?;
    Ok(Json(resp))
}
