//! Repository functions for the settings table.

use crate::db::connection::DbPool;
use crate::models::setting::SettingRow;

const SELECT: &str = "SELECT _id, key, value FROM settings";

pub async fn list(pool: &DbPool) -> Result<Vec<SettingRow>, sqlx::Error> {
    sqlx::query_as::<_, SettingRow>(&format!("{SELECT} ORDER BY _id ASC"))
        .fetch_all(pool)
        .await
}

pub async fn insert(pool: &DbPool, key: &str, value: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update(pool: &DbPool, id: i64, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE settings SET key = ?, value = ? WHERE _id = ?")
        .bind(key)
        .bind(value)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rows whose key starts with `Plugin.<plugin>.`; used to assemble a
/// plugin's option map.
pub async fn plugin_options(pool: &DbPool, plugin: &str) -> Result<Vec<SettingRow>, sqlx::Error> {
    sqlx::query_as::<_, SettingRow>(&format!("{SELECT} WHERE key LIKE ? ORDER BY _id ASC"))
        .bind(format!("Plugin.{plugin}.%"))
        .fetch_all(pool)
        .await
}
