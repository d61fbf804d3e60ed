//! Keeper API server binary.
//!
//! Serves the REST API backed by PostgreSQL, or by in-process stores with
//! `--memory`, and purges expired refresh tokens in the background.

use std::time::Duration;

use clap::Parser;
use keeper_api::AppState;
use keeper_api::background::token_cleanup::{self, DEFAULT_CLEANUP_INTERVAL};
use keeper_api::config::ApiConfig;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "keeper_server", about = "Keeper API server")]
struct Args {
    /// Port to listen on on 127.0.0.1. Overrides `BIND_ADDR` when given.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users, tokens and todos in memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Seconds between purges of expired refresh tokens.
    #[arg(long, default_value_t = DEFAULT_CLEANUP_INTERVAL.as_secs())]
    cleanup_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,keeper_api=debug,keeper_core=debug")
                }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(port) = args.port {
        config.bind_addr = format!("127.0.0.1:{port}");
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    let state = if args.memory {
        warn!("in-memory mode: data is lost on shutdown");
        AppState::in_memory(config.clone())
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        keeper_api::migrate(&pool).await?;

        AppState::postgres(pool, config.clone())
    };

    let cleanup_ct = CancellationToken::new();
    let cleanup_handle = tokio::spawn(token_cleanup::run(
        state.tokens.clone(),
        Duration::from_secs(args.cleanup_interval_secs.max(1)),
        cleanup_ct.clone(),
    ));

    let app = keeper_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    cleanup_ct.cancel();
    let _ = cleanup_handle.await;

    api_result?;

    Ok(())
}
