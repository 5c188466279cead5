//! Usage aggregation over the tasks table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::connection::DbPool;
use crate::models::limits::Limits;
use crate::repositories;
use crate::services::users::UserManager;
use crate::utils::system::HostResources;
use crate::utils::time;

/// Per-user resource usage over a reporting window.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceEntry {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: String,
    pub email: String,
    pub count: i64,
    pub cpu: i64,
    pub gpu: i64,
    pub memory: i64,
    pub gpumemory: i64,
    pub storage: i64,
}

/// Sums, per user, each finished task's effective limits (zero CPU/memory
/// replaced by the host totals) multiplied by its runtime in seconds.
/// Output is ordered by user id.
pub async fn performance(
    pool: &DbPool,
    users: &UserManager,
    host: HostResources,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<PerformanceEntry>, sqlx::Error> {
    let from = from.map(time::to_timestamp);
    let to = to.map(time::to_timestamp);
    let rows =
        repositories::tasks::report(pool, None, from.as_deref(), to.as_deref()).await?;

    let mut by_user: BTreeMap<i64, PerformanceEntry> = BTreeMap::new();
    for row in rows {
        let (Some(start), Some(end)) = (
            row.start_time.as_deref().and_then(time::parse_timestamp),
            row.end_time.as_deref().and_then(time::parse_timestamp),
        ) else {
            continue;
        };

        let mut limits = row.native_limits();
        if limits.cpu == 0 {
            limits.cpu = host.cpu;
        }
        if limits.memory == 0 {
            limits.memory = host.memory;
        }
        let seconds = (end - start).num_milliseconds() / 1000;

        let entry = by_user.entry(row.user).or_insert_with(|| {
            let account = users.by_id(row.user);
            PerformanceEntry {
                id: row.user,
                user: account
                    .as_ref()
                    .map(|user| user.name.clone())
                    .unwrap_or_default(),
                email: account
                    .as_ref()
                    .map(|user| user.email.clone())
                    .unwrap_or_default(),
                count: 0,
                cpu: 0,
                gpu: 0,
                memory: 0,
                gpumemory: 0,
                storage: 0,
            }
        });
        entry.count += 1;
        entry.cpu += limits.cpu * seconds;
        entry.gpu += limits.gpu * seconds;
        entry.memory += limits.memory * seconds;
        entry.gpumemory += limits.gpumemory * seconds;
        entry.storage += limits.storage * seconds;
    }

    Ok(by_user.into_values().collect())
}

/// Effective limits used by the usage accounting; exposed for tests.
pub fn effective_limits(limits: Limits, host: HostResources) -> Limits {
    Limits {
        cpu: if limits.cpu == 0 { host.cpu } else { limits.cpu },
        memory: if limits.memory == 0 {
            host.memory
        } else {
            limits.memory
        },
        ..limits
    }
}
