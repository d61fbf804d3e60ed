//! Authentication middleware: Bearer token extraction and access token
//! validation.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use keeper_core::auth::AuthError;
use keeper_core::models::auth::Claims;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Claims of the caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

/// Axum middleware: extracts `Authorization: Bearer <token>`, validates it
/// through the token manager, and injects `AuthenticatedUser` into request
/// extensions. Any failure is a 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state
        .tokens
        .validate_access_token(token)
        .map_err(|e| {
            debug!(error = %e, "rejected access token");
            match e {
                AuthError::Expired => AppError::Unauthorized("Token expired".into()),
                _ => AppError::Unauthorized("Invalid token".into()),
            }
        })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}
