//! Periodic retention sweep: aged tasks, stale users, expired tokens. The
//! three steps are independent and each isolates its own failure.

use chrono::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::connection::DbPool;
use crate::repositories;
use crate::utils::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSettings {
    /// Sweep period in milliseconds.
    pub interval_ms: i64,
    /// Age bound for finished tasks; 0 disables the task sweep.
    pub keep_tasks_ms: i64,
    /// Age bound for user last-logins; 0 disables the user sweep.
    pub keep_users_ms: i64,
}

/// Runs the sweep loop until the configuration channel closes. Changing
/// the settings re-arms the timer with the new interval.
pub fn spawn(pool: DbPool, mut settings: watch::Receiver<RetentionSettings>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let current = *settings.borrow();
            let period = std::time::Duration::from_millis(current.interval_ms.max(1000) as u64);
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    let snapshot = *settings.borrow();
                    cleanup(&pool, snapshot).await;
                }
                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// One sweep pass.
pub async fn cleanup(pool: &DbPool, settings: RetentionSettings) {
    let now = time::now_utc();

    if settings.keep_tasks_ms > 0 {
        let cutoff = time::to_timestamp(now - Duration::milliseconds(settings.keep_tasks_ms));
        match repositories::tasks::remove_finished_before(pool, &cutoff).await {
            Ok(removed) if removed > 0 => tracing::info!(removed, "removed aged tasks"),
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "task retention sweep failed"),
        }
    }

    match repositories::tokens::remove_expired(pool, &time::to_timestamp(now)).await {
        Ok(removed) if removed > 0 => tracing::info!(removed, "removed expired tokens"),
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "token retention sweep failed"),
    }

    if settings.keep_users_ms > 0 {
        let cutoff = time::to_timestamp(now - Duration::milliseconds(settings.keep_users_ms));
        match repositories::users::remove_stale_before(pool, &cutoff).await {
            Ok(removed) if removed > 0 => tracing::info!(removed, "removed stale users"),
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "user retention sweep failed"),
        }
    }
}
