//! Retention sweeper: deletes captured requests older than the retention window

use crate::db::{queries, StoreError};
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::watch;

/// Delete everything older than `now - retention_window` once
pub async fn sweep_once(pool: &SqlitePool, retention_window: Duration) -> Result<u64, StoreError> {
    let window = chrono::Duration::from_std(retention_window).unwrap_or(chrono::Duration::MAX);
    let threshold = Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    queries::delete_requests_older_than(pool, threshold).await
}

/// Start the periodic sweeper.
///
/// A failed sweep is logged and retried on the next tick. The task exits
/// when `shutdown_rx` flips to `true`.
pub fn spawn_sweeper(
    pool: SqlitePool,
    retention_window: Duration,
    sweep_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match sweep_once(&pool, retention_window).await {
                        Ok(0) => tracing::debug!("Retention sweep: nothing to delete"),
                        Ok(deleted) => tracing::info!("Retention sweep deleted {} requests", deleted),
                        Err(e) => tracing::error!("Retention sweep failed: {}", e),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Retention sweeper shutting down");
                        break;
                    }
                }
            }
        }
    })
}
