//! Periodic purge of expired refresh tokens.
//!
//! Runs on a fixed interval using `tokio::time::interval` until cancelled.

use std::sync::Arc;
use std::time::Duration;

use keeper_core::auth::manager::TokenManager;
use tokio_util::sync::CancellationToken;

/// Default interval between purges.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(tokens: Arc<TokenManager>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "token cleanup job started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("token cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match tokens.purge_expired().await {
                    Ok(0) => tracing::debug!("token cleanup: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "token cleanup: purged expired tokens"),
                    Err(e) => tracing::error!(error = %e, "token cleanup failed"),
                }
            }
        }
    }
}
