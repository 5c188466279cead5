//! Repository functions for the users table.

use sqlx::{QueryBuilder, Sqlite};

use crate::db::connection::DbPool;
use crate::models::user::{NewUser, UserPatch, UserRow};

const SELECT: &str =
    "SELECT _id, name, password, email, lastLogin, limits, permissions, priority FROM users";

pub async fn list(pool: &DbPool) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!("{SELECT} ORDER BY _id ASC"))
        .fetch_all(pool)
        .await
}

pub async fn by_id(pool: &DbPool, id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!("{SELECT} WHERE _id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn by_name(pool: &DbPool, name: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(&format!("{SELECT} WHERE name = ?"))
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &DbPool, user: &NewUser) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (name, password, email, permissions, priority, limits) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(&user.email)
    .bind(user.permissions)
    .bind(user.priority)
    .bind(&user.limits)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update(pool: &DbPool, id: i64, patch: &UserPatch) -> Result<(), sqlx::Error> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    {
        let mut fields = builder.separated(", ");
        if let Some(name) = &patch.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(password) = &patch.password {
            fields
                .push("password = ")
                .push_bind_unseparated(password.clone());
        }
        if let Some(email) = &patch.email {
            fields.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(last_login) = &patch.last_login {
            fields
                .push("lastLogin = ")
                .push_bind_unseparated(last_login.clone());
        }
        if let Some(limits) = &patch.limits {
            fields.push("limits = ").push_bind_unseparated(limits.clone());
        }
        if let Some(permissions) = patch.permissions {
            fields
                .push("permissions = ")
                .push_bind_unseparated(permissions);
        }
        if let Some(priority) = patch.priority {
            fields.push("priority = ").push_bind_unseparated(priority);
        }
    }
    builder.push(" WHERE _id = ");
    builder.push_bind(id);
    builder.build().execute(pool).await?;
    Ok(())
}

pub async fn set_last_login(pool: &DbPool, id: i64, time: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET lastLogin = ? WHERE _id = ?")
        .bind(time)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_permissions(pool: &DbPool, id: i64, permissions: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET permissions = ? WHERE _id = ?")
        .bind(permissions)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Retention delete: users whose last login is older than the cutoff.
pub async fn remove_stale_before(pool: &DbPool, cutoff: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE lastLogin IS NOT NULL AND lastLogin < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Filtered select used by the user report: logged in after `last_logged`,
/// holding any bit of `permission_mask`.
pub async fn report(
    pool: &DbPool,
    last_logged: Option<&str>,
    permission_mask: Option<i64>,
) -> Result<Vec<UserRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT);
    let mut first = true;
    let mut prefix = move |builder: &mut QueryBuilder<Sqlite>| {
        builder.push(if std::mem::take(&mut first) {
            " WHERE "
        } else {
            " AND "
        });
    };

    if let Some(last_logged) = last_logged {
        prefix(&mut builder);
        builder
            .push("(lastLogin > ")
            .push_bind(last_logged.to_string())
            .push(" AND lastLogin IS NOT NULL)");
    }
    if let Some(mask) = permission_mask {
        prefix(&mut builder);
        builder
            .push("(permissions & ")
            .push_bind(mask)
            .push(") != 0");
    }
    builder.push(" ORDER BY _id ASC");
    builder.build_query_as::<UserRow>().fetch_all(pool).await
}
