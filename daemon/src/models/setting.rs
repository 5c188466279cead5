//! Advanced-setting rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database representation of a single advanced setting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SettingRow {
    #[sqlx(rename = "_id")]
    #[serde(rename = "_id")]
    pub id: i64,
    /// Case-insensitive unique key.
    pub key: String,
    pub value: Option<String>,
}
