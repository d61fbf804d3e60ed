//! Access token policy: signed, time-bounded JWTs carrying a claim set.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;

use super::{AuthError, random_token};
use crate::models::auth::{Claims, TokenClaims};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Encodes and decodes access tokens.
///
/// Implementations are stateless: validity is decided by the signature and
/// the embedded expiry alone, so any replica holding the key can validate.
pub trait AccessTokenPolicy: Send + Sync {
    /// Sign `claims` into a token valid from now for [`Self::lifetime_secs`].
    fn issue(&self, claims: &Claims) -> Result<String, AuthError>;

    /// Verify `token` and return its claims.
    ///
    /// Fails with `InvalidSignature` for tampered or malformed tokens and
    /// `Expired` once the current time is past the embedded expiry.
    fn validate(&self, token: &str) -> Result<Claims, AuthError>;

    /// Lifetime of issued tokens in seconds.
    fn lifetime_secs(&self) -> i64;
}

/// HS256 JWT implementation of [`AccessTokenPolicy`].
pub struct JwtPolicy {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl JwtPolicy {
    /// Policy with the default 15 minute lifetime.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetime(secret, Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS))
    }

    pub fn with_lifetime(secret: &[u8], lifetime: Duration) -> Self {
        // Expiry is checked against an explicit `now` in `validate_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, claims: &Claims, now: DateTime<Utc>) -> Result<String, AuthError> {
        let payload = TokenClaims {
            claims: claims.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Validate a token as if the current time were `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            }
        })?;
        if now.timestamp() > data.claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(data.claims.claims)
    }
}

impl AccessTokenPolicy for JwtPolicy {
    fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        self.issue_at(claims, Utc::now())
    }

    fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = random_token(64);
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keeper")
        .join("jwt-secret")
}
