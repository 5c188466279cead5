//! Bearer token rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database representation of an issued token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenRow {
    #[sqlx(rename = "_id")]
    #[serde(rename = "_id")]
    pub id: i64,
    /// Opaque 128-bit hex value.
    pub token: String,
    /// Login name of the token's user.
    pub user: String,
    #[sqlx(rename = "validUntil")]
    #[serde(rename = "validUntil")]
    pub valid_until: String,
}
