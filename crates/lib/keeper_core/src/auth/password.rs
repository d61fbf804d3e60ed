//! Credential verification. bcrypt is the shipped implementation.

use std::sync::OnceLock;

use super::{AuthError, random_token};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Hashes and checks passwords.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;

    /// Do the work of [`Self::verify`] against a throwaway hash and return
    /// `false`. Used when there is no stored hash, so that unknown accounts
    /// take as long to reject as wrong passwords.
    fn verify_dummy(&self, password: &str) -> Result<bool, AuthError>;
}

/// bcrypt-backed [`CredentialVerifier`].
#[derive(Debug, Clone)]
pub struct BcryptVerifier {
    cost: u32,
    dummy: OnceLock<String>,
}

impl BcryptVerifier {
    pub fn new() -> Self {
        Self::with_cost(BCRYPT_COST)
    }

    /// Lower costs are only meant for tests.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost,
            dummy: OnceLock::new(),
        }
    }

    /// Hash at this verifier's cost, computed on first use.
    fn dummy_hash(&self) -> Result<&str, AuthError> {
        if let Some(hash) = self.dummy.get() {
            return Ok(hash);
        }
        let hash = hash_password(&random_token(32), self.cost)?;
        Ok(self.dummy.get_or_init(|| hash))
    }
}

impl Default for BcryptVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for BcryptVerifier {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password, self.cost)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        verify_password(password, hash)
    }

    fn verify_dummy(&self, password: &str) -> Result<bool, AuthError> {
        verify_password(password, self.dummy_hash()?)?;
        Ok(false)
    }
}

/// Hash a password with bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let verifier = BcryptVerifier::with_cost(4);
        let hash = verifier.hash("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verifier.verify("correct horse", &hash).unwrap());
        assert!(!verifier.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn dummy_check_runs_at_configured_cost() {
        let verifier = BcryptVerifier::with_cost(5);
        assert!(!verifier.verify_dummy("anything").unwrap());
        assert!(verifier.dummy_hash().unwrap().starts_with("$2b$05$"));

        let first = verifier.dummy_hash().unwrap().to_string();
        assert!(!verifier.verify_dummy("other").unwrap());
        assert_eq!(verifier.dummy_hash().unwrap(), first);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let verifier = BcryptVerifier::with_cost(4);
        assert!(verifier.verify("pw", "not-a-bcrypt-hash").is_err());
    }
}
