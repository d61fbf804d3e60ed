//! API server configuration.

use keeper_core::auth::jwt::resolve_jwt_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Usernames (lowercase) granted admin when they register.
    pub admin_users: Vec<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                            |
    /// |------------------------------|------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                   |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/keeper` |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file      |
    /// | `KEEPER_ADMIN_USERS`         | empty (comma-separated usernames)  |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/keeper".into()),
            jwt_secret: resolve_jwt_secret(),
            admin_users: parse_admin_users(
                &std::env::var("KEEPER_ADMIN_USERS").unwrap_or_default(),
            ),
        }
    }

    /// Whether `username` is listed in `admin_users`.
    pub fn is_configured_admin(&self, username: &str) -> bool {
        let lower = username.to_lowercase();
        self.admin_users.iter().any(|u| *u == lower)
    }
}

/// Split a comma-separated username list, lowercasing and dropping blanks.
pub fn parse_admin_users(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
