//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types in `keeper_api` (which use camelCase on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role name carried in the claims of admin users.
pub const ADMIN_ROLE: &str = "admin";

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// `None` for users created through an external login.
    pub password_hash: Option<String>,
    pub is_admin: bool,
}

/// An account at an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLogin {
    pub provider: String,
    pub provider_key: String,
}

/// Identity facts carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// Username.
    pub name: String,
    /// Roles (`["admin"]` for admins, empty otherwise).
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// JWT payload: identity claims plus the validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub claims: Claims,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Refresh token record held by a `TokenStore`.
///
/// `value` is the plaintext handed to the client. Persistent stores keep
/// only its SHA-256 digest; the in-memory store keys by the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub value: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Set when the token is redeemed (rotated) or explicitly revoked.
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a refresh token at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenStatus {
    Active,
    Revoked,
    Expired,
}

impl RefreshToken {
    /// Revocation wins over expiry: a redeemed token stays `Revoked`.
    pub fn status_at(&self, now: DateTime<Utc>) -> RefreshTokenStatus {
        if self.revoked_at.is_some() {
            RefreshTokenStatus::Revoked
        } else if now >= self.expires_at {
            RefreshTokenStatus::Expired
        } else {
            RefreshTokenStatus::Active
        }
    }
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
