//! # keeper_api
//!
//! HTTP API library for Keeper.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use keeper_core::auth::jwt::JwtPolicy;
use keeper_core::auth::manager::TokenManager;
use keeper_core::auth::password::{BcryptVerifier, CredentialVerifier};
use keeper_core::auth::store::{MemoryTokenStore, PgTokenStore};
use keeper_core::auth::users::{MemoryUserRepository, PgUserRepository, UserRepository};
use keeper_core::todos::{MemoryTodoRepository, PgTodoRepository, TodoRepository};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{health, todos, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token issuance, rotation and validation.
    pub tokens: Arc<TokenManager>,
    /// User records.
    pub users: Arc<dyn UserRepository>,
    /// Todo records.
    pub todos: Arc<dyn TodoRepository>,
    /// Password hashing.
    pub credentials: Arc<dyn CredentialVerifier>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// State backed by PostgreSQL.
    pub fn postgres(pool: PgPool, config: ApiConfig) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
        let tokens = TokenManager::new(
            Arc::new(JwtPolicy::new(config.jwt_secret.as_bytes())),
            Arc::new(PgTokenStore::new(pool.clone())),
            users.clone(),
        );
        Self {
            tokens: Arc::new(tokens),
            users,
            todos: Arc::new(PgTodoRepository::new(pool)),
            credentials: Arc::new(BcryptVerifier::new()),
            config,
        }
    }

    /// State backed by in-process stores; nothing survives a restart.
    pub fn in_memory(config: ApiConfig) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
        let tokens = TokenManager::new(
            Arc::new(JwtPolicy::new(config.jwt_secret.as_bytes())),
            Arc::new(MemoryTokenStore::new()),
            users.clone(),
        );
        Self {
            tokens: Arc::new(tokens),
            users,
            todos: Arc::new(MemoryTodoRepository::new()),
            credentials: Arc::new(BcryptVerifier::new()),
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `keeper_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    keeper_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_USERS, post(users::register_handler))
        .route(routes::POST_USERS_TOKEN, post(users::login_handler))
        .route(
            routes::POST_USERS_TOKEN_PROVIDER,
            post(users::external_login_handler),
        )
        .route(routes::POST_USERS_REFRESH_TOKEN, post(users::refresh_handler))
        .route(routes::POST_USERS_LOGOUT, post(users::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            routes::TODOS,
            get(todos::list_todos_handler).post(todos::create_todo_handler),
        )
        .route(
            routes::TODOS_ID,
            get(todos::get_todo_handler)
                .put(todos::update_todo_handler)
                .delete(todos::delete_todo_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
