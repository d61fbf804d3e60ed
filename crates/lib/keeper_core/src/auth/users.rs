//! User records and external login links.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{ExternalLogin, User};
use crate::validation::FieldErrors;

/// How the admin flag of a new user is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminGrant {
    No,
    Yes,
    /// Admin iff no other user exists when the record is inserted. Decided
    /// atomically with the insert, so of concurrent first sign-ups exactly
    /// one becomes admin.
    IfFirstUser,
}

/// Access contract for user records.
///
/// Usernames are unique under case-insensitive comparison; the stored
/// spelling is preserved.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Case-insensitive lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    /// Create a user. A taken username is reported as a field error on
    /// `username`.
    async fn create(
        &self,
        username: &str,
        password_hash: Option<&str>,
        admin: AdminGrant,
    ) -> Result<User, AuthError>;

    /// Total number of users.
    async fn count(&self) -> Result<i64, AuthError>;

    /// User linked to an external provider account, if any.
    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, AuthError>;

    /// User linked to `login`, or a new password-less user named `username`
    /// created and linked in one step. Concurrent first logins for the same
    /// account resolve to a single user.
    async fn find_or_create_by_login(
        &self,
        login: &ExternalLogin,
        username: &str,
        admin: AdminGrant,
    ) -> Result<User, AuthError>;
}

fn username_taken() -> AuthError {
    AuthError::Validation(FieldErrors::single(
        "username",
        "Username is already taken",
    ))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

type UserRow = (Uuid, String, Option<String>, bool);

fn user_from_row((id, username, password_hash, is_admin): UserRow) -> User {
    User {
        id,
        username,
        password_hash,
        is_admin,
    }
}

/// Insert a user inside `tx`.
///
/// For [`AdminGrant::IfFirstUser`] the table is locked against concurrent
/// inserts until `tx` ends, so the emptiness check cannot race.
async fn insert_user(
    tx: &mut Transaction<'_, Postgres>,
    username: &str,
    password_hash: Option<&str>,
    admin: AdminGrant,
) -> Result<UserRow, sqlx::Error> {
    if admin == AdminGrant::IfFirstUser {
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut **tx)
            .await?;
    }
    sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (username, password_hash, is_admin) \
         SELECT $1, $2, $3 OR ($4 AND NOT EXISTS (SELECT 1 FROM users)) \
         RETURNING id, username, password_hash, is_admin",
    )
    .bind(username)
    .bind(password_hash)
    .bind(admin == AdminGrant::Yes)
    .bind(admin == AdminGrant::IfFirstUser)
    .fetch_one(&mut **tx)
    .await
}

/// PostgreSQL-backed user repository (`users`, `user_logins` tables).
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_linked(
        &self,
        login: &ExternalLogin,
        username: &str,
        admin: AdminGrant,
    ) -> Result<User, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = insert_user(&mut tx, username, None, admin).await?;
        sqlx::query(
            "INSERT INTO user_logins (provider, provider_key, user_id) VALUES ($1, $2, $3)",
        )
        .bind(&login.provider)
        .bind(&login.provider_key)
        .bind(row.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user_from_row(row))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, is_admin FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, is_admin FROM users \
             WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create(
        &self,
        username: &str,
        password_hash: Option<&str>,
        admin: AdminGrant,
    ) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;
        let row = insert_user(&mut tx, username, password_hash, admin)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    username_taken()
                } else {
                    AuthError::Db(e)
                }
            })?;
        tx.commit().await?;
        Ok(user_from_row(row))
    }

    async fn count(&self) -> Result<i64, AuthError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.username, u.password_hash, u.is_admin \
             FROM user_logins l JOIN users u ON u.id = l.user_id \
             WHERE l.provider = $1 AND l.provider_key = $2",
        )
        .bind(provider)
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_or_create_by_login(
        &self,
        login: &ExternalLogin,
        username: &str,
        admin: AdminGrant,
    ) -> Result<User, AuthError> {
        if let Some(user) = self
            .find_by_login(&login.provider, &login.provider_key)
            .await?
        {
            return Ok(user);
        }

        match self.create_linked(login, username, admin).await {
            Ok(user) => Ok(user),
            // Either another request linked this login first, or the
            // username belongs to someone else. The transaction rolled back.
            Err(e) if is_unique_violation(&e) => self
                .find_by_login(&login.provider, &login.provider_key)
                .await?
                .ok_or_else(username_taken),
            Err(e) => Err(AuthError::Db(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process user repository.
///
/// Creation is serialized by `create_lock`; lookups go straight to the maps.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: DashMap<Uuid, User>,
    /// Lowercased username → id.
    names: DashMap<String, Uuid>,
    /// (provider, provider_key) → id.
    logins: DashMap<(String, String), Uuid>,
    create_lock: Mutex<()>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user and its logins. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> bool {
        let Some((_, user)) = self.users.remove(&id) else {
            return false;
        };
        self.names.remove(&user.username.to_lowercase());
        self.logins.retain(|_, owner| *owner != id);
        true
    }

    /// Replace the admin flag of an existing user.
    pub fn set_admin(&self, id: Uuid, is_admin: bool) -> bool {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.is_admin = is_admin;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a user. The caller holds `create_lock`.
    fn insert_locked(
        &self,
        username: &str,
        password_hash: Option<&str>,
        admin: AdminGrant,
    ) -> Result<User, AuthError> {
        let key = username.to_lowercase();
        if self.names.contains_key(&key) {
            return Err(username_taken());
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.map(str::to_string),
            is_admin: match admin {
                AdminGrant::No => false,
                AdminGrant::Yes => true,
                AdminGrant::IfFirstUser => self.users.is_empty(),
            },
        };
        self.users.insert(user.id, user.clone());
        self.names.insert(key, user.id);
        Ok(user)
    }

    fn linked_user(&self, provider: &str, provider_key: &str) -> Option<User> {
        let key = (provider.to_string(), provider_key.to_string());
        let id = self.logins.get(&key).map(|id| *id)?;
        self.users.get(&id).map(|u| u.value().clone())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let Some(id) = self.names.get(&username.to_lowercase()).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn create(
        &self,
        username: &str,
        password_hash: Option<&str>,
        admin: AdminGrant,
    ) -> Result<User, AuthError> {
        let _guard = self.lock();
        self.insert_locked(username, password_hash, admin)
    }

    async fn count(&self) -> Result<i64, AuthError> {
        Ok(self.users.len() as i64)
    }

    async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, AuthError> {
        Ok(self.linked_user(provider, provider_key))
    }

    async fn find_or_create_by_login(
        &self,
        login: &ExternalLogin,
        username: &str,
        admin: AdminGrant,
    ) -> Result<User, AuthError> {
        let _guard = self.lock();
        if let Some(user) = self.linked_user(&login.provider, &login.provider_key) {
            return Ok(user);
        }
        let user = self.insert_locked(username, None, admin)?;
        self.logins.insert(
            (login.provider.clone(), login.provider_key.clone()),
            user.id,
        );
        Ok(user)
    }
}
