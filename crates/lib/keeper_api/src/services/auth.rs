//! Account service: registration and credential/refresh flows delegating to
//! `keeper_core::auth`.

use keeper_core::auth::AuthError;
use keeper_core::auth::users::AdminGrant;
use keeper_core::models::auth::{ExternalLogin, TokenPair};
use keeper_core::validation::FieldErrors;
use tracing::{debug, info};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{LogoutResponse, TokenResponse, UserResponse};

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Allowed username length range.
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=64;

/// Check a username: 3–64 characters of letters, digits, `_`, `.` or `-`.
fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", "Username is required");
        return;
    }
    if !USERNAME_LEN.contains(&username.chars().count()) {
        errors.add(
            "username",
            format!(
                "Username must be between {} and {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            ),
        );
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        errors.add(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
        );
    }
}

/// Validate registration input.
pub fn validate_registration(username: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_username(username, &mut errors);
    if password.len() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    errors.into_result()
}

/// Validate external login input.
pub fn validate_external_login(
    provider: &str,
    username: &str,
    provider_key: &str,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if provider.trim().is_empty() {
        errors.add("provider", "Provider is required");
    }
    check_username(username, &mut errors);
    if provider_key.trim().is_empty() {
        errors.add("providerKey", "Provider key is required");
    }
    errors.into_result()
}

fn token_response(pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
        token_type: "Bearer".to_string(),
    }
}

/// New users are admins when they are listed in the configured admin
/// usernames or are the first account. The flag is fixed at creation.
fn admin_grant(state: &AppState, username: &str) -> AdminGrant {
    if state.config.is_configured_admin(username) {
        AdminGrant::Yes
    } else {
        AdminGrant::IfFirstUser
    }
}

/// Register a new user with a password.
pub async fn register(state: &AppState, username: &str, password: &str) -> AppResult<UserResponse> {
    validate_registration(username, password).map_err(AppError::Validation)?;

    let hash = state.credentials.hash(password)?;
    let user = state
        .users
        .create(username, Some(&hash), admin_grant(state, username))
        .await?;

    info!(user_id = %user.id, username = %user.username, is_admin = user.is_admin, "registered user");
    Ok(UserResponse {
        id: user.id,
        username: user.username,
        is_admin: user.is_admin,
    })
}

/// Exchange username + password for a token pair.
pub async fn login(state: &AppState, username: &str, password: &str) -> AppResult<TokenResponse> {
    let user = state.users.find_by_username(username).await?;

    // Unknown users and external-login users (no password) still pay for a
    // hash check so the response time does not reveal which names exist.
    let verified = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
        Some(hash) => state.credentials.verify(password, hash)?,
        None => state.credentials.verify_dummy(password)?,
    };
    let user = match user {
        Some(user) if verified => user,
        _ => return Err(AuthError::InvalidCredentials.into()),
    };

    let pair = state.tokens.issue_token_pair(&user).await?;
    info!(user_id = %user.id, "login succeeded");
    Ok(token_response(pair))
}

/// Issue tokens for an external provider identity, creating and linking the
/// user on first sight.
pub async fn external_login(
    state: &AppState,
    provider: &str,
    username: &str,
    provider_key: &str,
) -> AppResult<TokenResponse> {
    validate_external_login(provider, username, provider_key).map_err(AppError::Validation)?;

    let login = ExternalLogin {
        provider: provider.to_string(),
        provider_key: provider_key.to_string(),
    };
    let user = state
        .users
        .find_or_create_by_login(&login, username, admin_grant(state, username))
        .await?;
    debug!(user_id = %user.id, provider, "external login resolved");

    let pair = state.tokens.issue_token_pair(&user).await?;
    Ok(token_response(pair))
}

/// Redeem a refresh token for a new pair.
pub async fn refresh(state: &AppState, token: &str) -> AppResult<TokenResponse> {
    if token.is_empty() {
        return Err(AppError::BadRequest("Refresh token is required".into()));
    }
    let pair = state.tokens.refresh_tokens(token).await.inspect_err(|e| {
        if e.is_client_error() {
            info!(error = %e, "refresh token rejected");
        }
    })?;
    Ok(token_response(pair))
}

/// Revoke a refresh token. Unknown or already-revoked tokens are not an error.
pub async fn logout(state: &AppState, token: &str) -> AppResult<LogoutResponse> {
    if !token.is_empty() {
        state.tokens.revoke(token).await?;
    }
    Ok(LogoutResponse { success: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rules() {
        assert!(validate_registration("alice", "password1").is_ok());

        let errors = validate_registration("", "short").unwrap_err();
        assert_eq!(errors.get("username"), ["Username is required"]);
        assert_eq!(errors.get("password").len(), 1);

        let errors = validate_registration("a!", "password1").unwrap_err();
        assert!(errors.get("password").is_empty());
        assert_eq!(errors.get("username").len(), 2);
    }

    #[test]
    fn external_login_rules() {
        assert!(validate_external_login("github", "bob", "123").is_ok());
        let errors = validate_external_login(" ", "bob", "").unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["provider", "providerKey"]);
    }
}
