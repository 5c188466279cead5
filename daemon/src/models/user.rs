//! User rows and edit payloads.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::limits::Limits;
use crate::models::permissions::{has_permission, Permission};

/// Database representation of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    /// Unique user identifier.
    #[sqlx(rename = "_id")]
    #[serde(rename = "_id")]
    pub id: i64,
    /// Unique login name.
    pub name: String,
    /// SHA-512 hex digest of `password || salt`.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub email: Option<String>,
    #[sqlx(rename = "lastLogin")]
    #[serde(rename = "lastLogin")]
    pub last_login: Option<String>,
    /// Encoded resource limits applied to every task the user owns.
    pub limits: Option<String>,
    /// Permission bitmask.
    pub permissions: i64,
    /// Upper bound for the nice value of submitted tasks.
    pub priority: i64,
}

impl UserRow {
    pub fn has_permission(&self, permission: Permission) -> bool {
        has_permission(self.permissions as u32, permission)
    }

    pub fn native_limits(&self) -> Limits {
        Limits::parse(self.limits.as_deref().unwrap_or_default())
    }
}

/// Fully resolved user definition, ready to insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password_hash: String,
    pub email: String,
    pub permissions: i64,
    pub priority: i64,
    pub limits: String,
}

/// Partial edit of a user row. Non-admin callers keep only their password
/// and email after projection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    /// Already hashed; plain-text input is hashed at the facade boundary.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<String>,
    pub limits: Option<String>,
    pub permissions: Option<i64>,
    pub priority: Option<i64>,
}

impl UserPatch {
    pub fn drop_admin_fields(&self) -> UserPatch {
        UserPatch {
            password: self.password.clone(),
            email: self.email.clone(),
            ..UserPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.password.is_none()
            && self.email.is_none()
            && self.last_login.is_none()
            && self.limits.is_none()
            && self.permissions.is_none()
            && self.priority.is_none()
    }
}
