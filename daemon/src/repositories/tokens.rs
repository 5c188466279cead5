//! Repository functions for the tokens table.

use crate::db::connection::DbPool;
use crate::models::token::TokenRow;

const SELECT: &str = "SELECT _id, token, user, validUntil FROM tokens";

pub async fn list(pool: &DbPool) -> Result<Vec<TokenRow>, sqlx::Error> {
    sqlx::query_as::<_, TokenRow>(&format!("{SELECT} ORDER BY _id ASC"))
        .fetch_all(pool)
        .await
}

pub async fn insert(
    pool: &DbPool,
    token: &str,
    user: &str,
    valid_until: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO tokens (token, user, validUntil) VALUES (?, ?, ?)")
        .bind(token)
        .bind(user)
        .bind(valid_until)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn remove_by_value(pool: &DbPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM tokens WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drops every token that expired before `now`; run during startup before
/// loading the survivors, and by each retention sweep.
pub async fn remove_expired(pool: &DbPool, now: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tokens WHERE validUntil < ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
