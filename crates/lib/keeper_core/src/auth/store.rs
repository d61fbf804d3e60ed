//! Refresh token storage.
//!
//! The [`TokenStore`] trait is the access contract; [`PgTokenStore`] persists
//! SHA-256 digests of the token values in PostgreSQL and
//! [`MemoryTokenStore`] keeps records in process for tests and `--memory`
//! mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::RefreshToken;
use crate::uuid::uuidv7;

/// Persistence contract for refresh tokens.
///
/// Token values are unique across all records and never reused.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a new token. Fails if the value already exists.
    async fn save(&self, token: &RefreshToken) -> Result<(), AuthError>;

    /// Look up a token regardless of its revocation or expiry state.
    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, AuthError>;

    /// Mark a token revoked if it is not already.
    ///
    /// This is a single atomic check-and-set: of several concurrent calls for
    /// the same value at most one returns `true`.
    async fn revoke(&self, value: &str) -> Result<bool, AuthError>;

    /// Revoke `old` and save `new` as one unit.
    ///
    /// Returns `false` without saving when `old` is missing or already
    /// revoked. On error neither change is applied.
    async fn rotate(&self, old: &str, new: &RefreshToken) -> Result<bool, AuthError>;

    /// Delete tokens whose expiry is at or before `now`. Returns the count.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;

    /// Revoke every active token belonging to `user_id`. Returns the count.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;
}

/// SHA-256 hash a refresh token for storage.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

async fn insert_token<'e, E>(executor: E, token: &RefreshToken) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at, revoked_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(uuidv7())
    .bind(hash_token(&token.value))
    .bind(token.user_id)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// PostgreSQL-backed token store (`refresh_tokens` table).
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn save(&self, token: &RefreshToken) -> Result<(), AuthError> {
        insert_token(&self.pool, token).await?;
        Ok(())
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, DateTime<Utc>, Option<DateTime<Utc>>)>(
            "SELECT user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(hash_token(value))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, expires_at, revoked_at)| RefreshToken {
            value: value.to_string(),
            user_id,
            expires_at,
            revoked_at,
        }))
    }

    async fn revoke(&self, value: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(hash_token(value))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn rotate(&self, old: &str, new: &RefreshToken) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(hash_token(old))
        .execute(&mut *tx)
        .await?;
        if revoked.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }
        insert_token(&mut *tx, new).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process token store. Revocation holds the entry's shard lock for the
/// check-and-set, which gives the same at-most-one guarantee as the
/// conditional `UPDATE` in PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, RefreshToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, token: &RefreshToken) -> Result<(), AuthError> {
        match self.tokens.entry(token.value.clone()) {
            Entry::Occupied(_) => Err(AuthError::Internal(
                "refresh token value already exists".into(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self.tokens.get(value).map(|t| t.value().clone()))
    }

    async fn revoke(&self, value: &str) -> Result<bool, AuthError> {
        let Some(mut token) = self.tokens.get_mut(value) else {
            return Ok(false);
        };
        if token.revoked_at.is_some() {
            return Ok(false);
        }
        token.revoked_at = Some(Utc::now());
        Ok(true)
    }

    async fn rotate(&self, old: &str, new: &RefreshToken) -> Result<bool, AuthError> {
        // The guard on `old` is released before `new` is inserted; both keys
        // may share a shard.
        if !self.revoke(old).await? {
            return Ok(false);
        }
        if let Err(e) = self.save(new).await {
            if let Some(mut token) = self.tokens.get_mut(old) {
                token.revoked_at = None;
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|t| t.expires_at <= now)
            .map(|t| t.key().clone())
            .collect();
        let mut deleted = 0;
        for key in expired {
            if self
                .tokens
                .remove_if(&key, |_, t| t.expires_at <= now)
                .is_some()
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut revoked = 0;
        for mut token in self.tokens.iter_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
