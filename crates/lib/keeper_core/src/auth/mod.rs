//! Authentication and authorization logic.
//!
//! Provides the claims factory, the signed access-token policy, refresh-token
//! storage, the token manager that ties them together, and the ownership
//! check applied to todo operations.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod manager;
pub mod password;
pub mod store;
pub mod users;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;

use crate::validation::FieldErrors;

/// Generate a cryptographically random alphanumeric string.
pub(crate) fn random_token(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Token not found")]
    NotFound,

    #[error("Unknown user")]
    UnknownUser,

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for failures caused by the presented token or credentials, as
    /// opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::Db(_) | AuthError::Internal(_))
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        AuthError::Validation(errors)
    }
}
