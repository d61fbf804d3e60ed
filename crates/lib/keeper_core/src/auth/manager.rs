//! Token manager: issues, rotates and validates token pairs.
//!
//! Access tokens are stateless: once issued they carry the claims (including
//! the admin role) that were current at issuance until they expire. A change
//! to a user's admin flag therefore becomes visible only when the client
//! next redeems its refresh token, at most one access-token lifetime later.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::claims_for;
use super::jwt::AccessTokenPolicy;
use super::store::TokenStore;
use super::users::UserRepository;
use super::{AuthError, random_token};
use crate::models::auth::{Claims, RefreshToken, RefreshTokenStatus, TokenPair, User};

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// Length of generated refresh token values.
const REFRESH_TOKEN_LEN: usize = 64;

/// Orchestrates the access/refresh token lifecycle.
///
/// The manager is the only component that mutates refresh-token state.
pub struct TokenManager {
    policy: Arc<dyn AccessTokenPolicy>,
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserRepository>,
    refresh_lifetime: Duration,
}

impl TokenManager {
    pub fn new(
        policy: Arc<dyn AccessTokenPolicy>,
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            policy,
            store,
            users,
            refresh_lifetime: Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        }
    }

    pub fn with_refresh_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_lifetime = lifetime;
        self
    }

    /// Issue a new access/refresh token pair for `user`.
    pub async fn issue_token_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let (pair, record) = self.mint(user)?;
        self.store.save(&record).await?;

        debug!(user_id = %user.id, admin = user.is_admin, "issued token pair");
        Ok(pair)
    }

    /// Sign an access token and generate a refresh record, without storing it.
    fn mint(&self, user: &User) -> Result<(TokenPair, RefreshToken), AuthError> {
        let access_token = self.policy.issue(&claims_for(user))?;
        let record = RefreshToken {
            value: random_token(REFRESH_TOKEN_LEN),
            user_id: user.id,
            expires_at: Utc::now() + self.refresh_lifetime,
            revoked_at: None,
        };
        let pair = TokenPair {
            access_token,
            refresh_token: record.value.clone(),
            expires_in: self.policy.lifetime_secs(),
        };
        Ok((pair, record))
    }

    /// Redeem a refresh token for a new pair (single-use rotation).
    ///
    /// The user record is re-read so the new claims reflect current admin
    /// status. Every check runs before the store is touched and the swap of
    /// old for new token is a single [`TokenStore::rotate`], so a failure
    /// leaves the presented token usable. A token whose user no longer
    /// exists is rejected with `UnknownUser` and left as it is.
    pub async fn refresh_tokens(&self, value: &str) -> Result<TokenPair, AuthError> {
        let record = self
            .store
            .find_by_value(value)
            .await?
            .ok_or(AuthError::NotFound)?;

        match record.status_at(Utc::now()) {
            RefreshTokenStatus::Active => {}
            RefreshTokenStatus::Revoked => return Err(AuthError::Revoked),
            RefreshTokenStatus::Expired => return Err(AuthError::Expired),
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        let (pair, next) = self.mint(&user)?;
        if !self.store.rotate(value, &next).await? {
            warn!(user_id = %record.user_id, "refresh token redeemed concurrently");
            return Err(AuthError::Revoked);
        }

        debug!(user_id = %user.id, admin = user.is_admin, "rotated refresh token");
        Ok(pair)
    }

    /// Validate a bearer access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.policy.validate(token)
    }

    /// Revoke a single refresh token (logout). Returns whether it was active.
    pub async fn revoke(&self, value: &str) -> Result<bool, AuthError> {
        self.store.revoke(value).await
    }

    /// Revoke every refresh token held by `user_id`.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.store.revoke_all_for_user(user_id).await?;
        debug!(%user_id, revoked, "revoked all refresh tokens");
        Ok(revoked)
    }

    /// Delete expired refresh tokens from the store.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        self.store.delete_expired(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::auth::jwt::JwtPolicy;
    use crate::auth::store::MemoryTokenStore;
    use crate::auth::users::{AdminGrant, MemoryUserRepository};

    struct Fixture {
        manager: Arc<TokenManager>,
        store: Arc<MemoryTokenStore>,
        users: Arc<MemoryUserRepository>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryTokenStore::new());
        let users = Arc::new(MemoryUserRepository::new());
        let manager = Arc::new(TokenManager::new(
            Arc::new(JwtPolicy::new(b"test-secret")),
            store.clone(),
            users.clone(),
        ));
        Fixture {
            manager,
            store,
            users,
        }
    }

    async fn user(f: &Fixture, name: &str, is_admin: bool) -> User {
        let admin = if is_admin { AdminGrant::Yes } else { AdminGrant::No };
        f.users.create(name, Some("hash"), admin).await.unwrap()
    }

    #[tokio::test]
    async fn issued_access_token_validates_to_user() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;

        let pair = f.manager.issue_token_pair(&alice).await.unwrap();
        let claims = f.manager.validate_access_token(&pair.access_token).unwrap();

        assert_eq!(claims.sub, alice.id);
        assert_eq!(claims.name, "alice");
        assert!(!claims.is_admin());
        assert_eq!(pair.refresh_token.len(), REFRESH_TOKEN_LEN);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn refresh_rotates_and_prevents_reuse() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let first = f.manager.issue_token_pair(&alice).await.unwrap();

        let second = f.manager.refresh_tokens(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        let claims = f.manager.validate_access_token(&second.access_token).unwrap();
        assert_eq!(claims.sub, alice.id);

        let err = f.manager.refresh_tokens(&first.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));

        // The rotated token is still good.
        assert!(f.manager.refresh_tokens(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let f = fixture();
        let err = f.manager.refresh_tokens("nope").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        f.store
            .save(&RefreshToken {
                value: "stale".into(),
                user_id: alice.id,
                expires_at: Utc::now() - Duration::minutes(1),
                revoked_at: None,
            })
            .await
            .unwrap();

        let err = f.manager.refresh_tokens("stale").await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn logged_out_token_is_revoked() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let pair = f.manager.issue_token_pair(&alice).await.unwrap();

        assert!(f.manager.revoke(&pair.refresh_token).await.unwrap());
        let err = f.manager.refresh_tokens(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn revoke_all_invalidates_every_session() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let a = f.manager.issue_token_pair(&alice).await.unwrap();
        let b = f.manager.issue_token_pair(&alice).await.unwrap();

        assert_eq!(f.manager.revoke_all(alice.id).await.unwrap(), 2);
        for token in [a.refresh_token, b.refresh_token] {
            assert!(matches!(
                f.manager.refresh_tokens(&token).await,
                Err(AuthError::Revoked)
            ));
        }
    }

    #[tokio::test]
    async fn deleted_user_cannot_refresh() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let pair = f.manager.issue_token_pair(&alice).await.unwrap();
        f.users.remove(alice.id);

        let err = f.manager.refresh_tokens(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
        let record = f.store.find_by_value(&pair.refresh_token).await.unwrap().unwrap();
        assert!(record.revoked_at.is_none());
    }

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryTokenStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), AuthError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(AuthError::Internal("storage unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TokenStore for FlakyStore {
        async fn save(&self, token: &RefreshToken) -> Result<(), AuthError> {
            self.check()?;
            self.inner.save(token).await
        }

        async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, AuthError> {
            self.inner.find_by_value(value).await
        }

        async fn revoke(&self, value: &str) -> Result<bool, AuthError> {
            self.check()?;
            self.inner.revoke(value).await
        }

        async fn rotate(&self, old: &str, new: &RefreshToken) -> Result<bool, AuthError> {
            self.check()?;
            self.inner.rotate(old, new).await
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
            self.inner.delete_expired(now).await
        }

        async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
            self.inner.revoke_all_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn failed_rotation_keeps_presented_token() {
        let store = Arc::new(FlakyStore::default());
        let users = Arc::new(MemoryUserRepository::new());
        let manager = TokenManager::new(
            Arc::new(JwtPolicy::new(b"test-secret")),
            store.clone(),
            users.clone(),
        );
        let alice = users.create("alice", None, AdminGrant::No).await.unwrap();
        let pair = manager.issue_token_pair(&alice).await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        let err = manager.refresh_tokens(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(store.inner.len(), 1);

        store.failing.store(false, Ordering::SeqCst);
        assert!(manager.refresh_tokens(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_picks_up_admin_changes() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let pair = f.manager.issue_token_pair(&alice).await.unwrap();

        f.users.set_admin(alice.id, true);

        // Already-issued access tokens keep the old status until they expire.
        let stale = f.manager.validate_access_token(&pair.access_token).unwrap();
        assert!(!stale.is_admin());

        let fresh = f.manager.refresh_tokens(&pair.refresh_token).await.unwrap();
        let claims = f.manager.validate_access_token(&fresh.access_token).unwrap();
        assert!(claims.is_admin());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemption_has_one_winner() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        let pair = f.manager.issue_token_pair(&alice).await.unwrap();

        let attempts = (0..8).map(|_| {
            let manager = f.manager.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { manager.refresh_tokens(&token).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut wins = 0;
        for result in results {
            match result.unwrap() {
                Ok(new_pair) => {
                    wins += 1;
                    assert!(f.manager.validate_access_token(&new_pair.access_token).is_ok());
                }
                Err(e) => assert!(matches!(e, AuthError::Revoked | AuthError::NotFound)),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let f = fixture();
        let alice = user(&f, "alice", false).await;
        f.manager.issue_token_pair(&alice).await.unwrap();
        f.store
            .save(&RefreshToken {
                value: "old".into(),
                user_id: alice.id,
                expires_at: Utc::now() - Duration::days(1),
                revoked_at: None,
            })
            .await
            .unwrap();

        assert_eq!(f.manager.purge_expired().await.unwrap(), 1);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn short_refresh_lifetime_applies() {
        let store = Arc::new(MemoryTokenStore::new());
        let users = Arc::new(MemoryUserRepository::new());
        let manager = TokenManager::new(
            Arc::new(JwtPolicy::new(b"k")),
            store.clone(),
            users.clone(),
        )
        .with_refresh_lifetime(Duration::seconds(-1));
        let bob = users.create("bob", None, AdminGrant::No).await.unwrap();

        let pair = manager.issue_token_pair(&bob).await.unwrap();
        assert!(matches!(
            manager.refresh_tokens(&pair.refresh_token).await,
            Err(AuthError::Expired)
        ));
    }
}
