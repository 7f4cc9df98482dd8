//! Background worker reclaiming orphaned index configurations.

use std::{sync::Arc, time::Duration};

use sqlx::PgPool;
use tracing::{error, info};

use super::manager::IndexManager;

/// Runs the orphan reclamation on a fixed interval.
///
/// Each cycle acquires only short per-corpus transactions; failures are
/// reported in the cleanup report and the loop keeps going. The task ends
/// with the runtime.
pub async fn run_orphan_sweeper(db_pool: Arc<PgPool>, interval: Duration) {
    info!(
        interval_secs = interval.as_secs(),
        "Index cleanup background task started"
    );

    let manager = IndexManager::new((*db_pool).clone());
    let mut ticker = tokio::time::interval(interval);

    // Skip the first immediate tick to let the app fully start
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match manager.clean_orphans().await {
            Ok(report) => info!(
                status = %report.status,
                deleted = report.deleted_count,
                errors = report.errors.len(),
                "Index cleanup cycle completed"
            ),
            Err(e) => error!(error = %e, "Index cleanup cycle failed"),
        }
    }
}
