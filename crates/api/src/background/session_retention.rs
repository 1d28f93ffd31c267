//! Periodic cleanup of expired import sessions.
//!
//! Spawns a loop that drops finished sessions once their retention
//! window passes, plus sessions that were previewed but never committed
//! within a day. Runs on a fixed interval using `tokio::time::interval`
//! until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::imports::session::ImportSessionStore;

/// How often the cleanup loop runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300); // 5 minutes

/// Run the session retention loop until `cancel` is triggered.
///
/// `retention_mins` is how long completed/failed sessions stay
/// queryable after their last update.
pub async fn run(store: Arc<ImportSessionStore>, retention_mins: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_mins,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Import session retention job started"
    );

    let retention = chrono::Duration::minutes(retention_mins);
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Import session retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let dropped = store.purge_expired(retention).await;
                if dropped > 0 {
                    tracing::info!(dropped, "Import session retention: purged expired sessions");
                }
            }
        }
    }
}
