//! Repository functions for the tasks table.

use sqlx::{QueryBuilder, Sqlite};

use crate::db::connection::DbPool;
use crate::models::task::{NewTask, TaskPatch, TaskRow};

const SELECT: &str = "SELECT _id, user, command, commandArguments, workDirectory, nice, uid, gid, limits, startTime, endTime FROM tasks";

pub async fn list(pool: &DbPool) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(&format!("{SELECT} ORDER BY _id ASC"))
        .fetch_all(pool)
        .await
}

/// Tasks that have not finished yet; loaded by the scheduler at startup.
pub async fn unfinished(pool: &DbPool) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(&format!(
        "{SELECT} WHERE endTime IS NULL ORDER BY _id ASC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn by_id(pool: &DbPool, id: i64) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(&format!("{SELECT} WHERE _id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &DbPool, task: &NewTask) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO tasks (user, command, commandArguments, workDirectory, nice, uid, gid, limits) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task.user)
    .bind(&task.command)
    .bind(&task.command_arguments)
    .bind(&task.work_directory)
    .bind(task.nice)
    .bind(task.uid)
    .bind(task.gid)
    .bind(&task.limits)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Applies a partial edit. The row id is never writable; an empty patch is a
/// no-op that reports success.
pub async fn update(pool: &DbPool, id: i64, patch: &TaskPatch) -> Result<(), sqlx::Error> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
    {
        let mut fields = builder.separated(", ");
        if let Some(user) = patch.user {
            fields.push("user = ").push_bind_unseparated(user);
        }
        if let Some(command) = &patch.command {
            fields.push("command = ").push_bind_unseparated(command.clone());
        }
        if let Some(arguments) = &patch.command_arguments {
            fields
                .push("commandArguments = ")
                .push_bind_unseparated(arguments.clone());
        }
        if let Some(directory) = &patch.work_directory {
            fields
                .push("workDirectory = ")
                .push_bind_unseparated(directory.clone());
        }
        if let Some(nice) = patch.nice {
            fields.push("nice = ").push_bind_unseparated(nice);
        }
        if let Some(uid) = patch.uid {
            fields.push("uid = ").push_bind_unseparated(uid);
        }
        if let Some(gid) = patch.gid {
            fields.push("gid = ").push_bind_unseparated(gid);
        }
        if let Some(limits) = &patch.limits {
            fields.push("limits = ").push_bind_unseparated(limits.clone());
        }
        if let Some(start) = &patch.start_time {
            fields.push("startTime = ").push_bind_unseparated(start.clone());
        }
        if let Some(end) = &patch.end_time {
            fields.push("endTime = ").push_bind_unseparated(end.clone());
        }
    }
    builder.push(" WHERE _id = ");
    builder.push_bind(id);
    builder.build().execute(pool).await?;
    Ok(())
}

pub async fn set_start_time(pool: &DbPool, id: i64, time: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET startTime = ? WHERE _id = ?")
        .bind(time)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_end_time(pool: &DbPool, id: i64, time: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET endTime = ? WHERE _id = ?")
        .bind(time)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Retention delete: finished tasks whose end time is older than the cutoff.
pub async fn remove_finished_before(pool: &DbPool, cutoff: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE endTime IS NOT NULL AND endTime < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Filtered select used by the task report: by owner, started after `from`
/// (or not yet started), finished before `to`.
pub async fn report(
    pool: &DbPool,
    user: Option<i64>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<TaskRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT);
    let mut first = true;
    let mut prefix = move |builder: &mut QueryBuilder<Sqlite>| {
        builder.push(if std::mem::take(&mut first) {
            " WHERE "
        } else {
            " AND "
        });
    };

    if let Some(user) = user {
        prefix(&mut builder);
        builder.push("user = ").push_bind(user);
    }
    if let Some(from) = from {
        prefix(&mut builder);
        builder
            .push("(startTime > ")
            .push_bind(from.to_string())
            .push(" OR startTime IS NULL)");
    }
    if let Some(to) = to {
        prefix(&mut builder);
        builder
            .push("(endTime < ")
            .push_bind(to.to_string())
            .push(" AND endTime IS NOT NULL)");
    }
    builder.push(" ORDER BY _id ASC");
    builder.build_query_as::<TaskRow>().fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_pool;
    use crate::db::schema::ensure_schema;

    async fn pool() -> DbPool {
        let pool = create_pool("sqlite::memory:").await.expect("pool");
        ensure_schema(&pool).await.expect("schema");
        pool
    }

    fn new_task(user: i64) -> NewTask {
        NewTask {
            user,
            command: "/bin/true".into(),
            command_arguments: String::new(),
            work_directory: "/tmp".into(),
            nice: 0,
            uid: 1,
            gid: 1,
            limits: "0\n0\n0\n0\n0".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let pool = pool().await;
        let first = insert(&pool, &new_task(1)).await.expect("insert");
        let second = insert(&pool, &new_task(1)).await.expect("insert");
        assert!(second > first);
    }

    #[tokio::test]
    async fn unfinished_excludes_completed_tasks() {
        let pool = pool().await;
        let done = insert(&pool, &new_task(1)).await.expect("insert");
        let open = insert(&pool, &new_task(1)).await.expect("insert");
        set_start_time(&pool, done, "2024-01-01T00:00:00.000Z")
            .await
            .expect("start");
        set_end_time(&pool, done, "2024-01-01T00:01:00.000Z")
            .await
            .expect("end");

        let rows = unfinished(&pool).await.expect("unfinished");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, open);
    }

    #[tokio::test]
    async fn update_applies_only_set_fields() {
        let pool = pool().await;
        let id = insert(&pool, &new_task(1)).await.expect("insert");
        let patch = TaskPatch {
            command: Some("/bin/false".into()),
            nice: Some(7),
            ..TaskPatch::default()
        };
        update(&pool, id, &patch).await.expect("update");

        let row = by_id(&pool, id).await.expect("select").expect("row");
        assert_eq!(row.command.as_deref(), Some("/bin/false"));
        assert_eq!(row.nice, 7);
        assert_eq!(row.work_directory.as_deref(), Some("/tmp"));
    }

    #[tokio::test]
    async fn retention_delete_honors_the_cutoff() {
        let pool = pool().await;
        let old = insert(&pool, &new_task(1)).await.expect("insert");
        let recent = insert(&pool, &new_task(1)).await.expect("insert");
        set_end_time(&pool, old, "2024-01-01T00:00:00.000Z")
            .await
            .expect("end");
        set_end_time(&pool, recent, "2024-06-01T00:00:00.000Z")
            .await
            .expect("end");

        let removed = remove_finished_before(&pool, "2024-03-01T00:00:00.000Z")
            .await
            .expect("sweep");
        assert_eq!(removed, 1);
        assert!(by_id(&pool, old).await.expect("select").is_none());
        assert!(by_id(&pool, recent).await.expect("select").is_some());
    }

    #[tokio::test]
    async fn report_filters_by_owner_and_window() {
        let pool = pool().await;
        let mine = insert(&pool, &new_task(1)).await.expect("insert");
        let theirs = insert(&pool, &new_task(2)).await.expect("insert");
        for id in [mine, theirs] {
            set_start_time(&pool, id, "2024-01-02T00:00:00.000Z")
                .await
                .expect("start");
            set_end_time(&pool, id, "2024-01-02T01:00:00.000Z")
                .await
                .expect("end");
        }

        let rows = report(
            &pool,
            Some(1),
            Some("2024-01-01T00:00:00.000Z"),
            Some("2024-12-31T00:00:00.000Z"),
        )
        .await
        .expect("report");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, mine);

        // A window that closes before the end time excludes the task.
        let rows = report(&pool, Some(1), None, Some("2024-01-02T00:30:00.000Z"))
            .await
            .expect("report");
        assert!(rows.is_empty());
    }
}
