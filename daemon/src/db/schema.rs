//! Declarative table schema and the additive bootstrap that keeps older
//! databases readable: tables and columns are only ever created, never
//! dropped or rewritten.

use sqlx::Row;

use crate::db::connection::DbPool;
use crate::models::permissions::Permission;

pub const SETTINGS_TABLE: &str = "settings";
pub const TASKS_TABLE: &str = "tasks";
pub const TOKENS_TABLE: &str = "tokens";
pub const USERS_TABLE: &str = "users";

/// Compiled-in schema marker, persisted as the `DatabaseVersion` setting.
pub const DATABASE_VERSION: i64 = 3;

/// Column description: name, SQL fragment used when adding it, and whether
/// editing it requires administrator permissions.
pub struct ColumnDef {
    pub name: &'static str,
    pub sql: &'static str,
    pub admin: bool,
}

pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

pub const SCHEMA: &[TableDef] = &[
    TableDef {
        name: SETTINGS_TABLE,
        columns: &[
            ColumnDef {
                name: "key",
                sql: "TEXT NOT NULL DEFAULT '0'",
                admin: true,
            },
            ColumnDef {
                name: "value",
                sql: "TEXT",
                admin: true,
            },
        ],
    },
    TableDef {
        name: TASKS_TABLE,
        columns: &[
            ColumnDef {
                name: "user",
                sql: "INTEGER NOT NULL DEFAULT 0",
                admin: true,
            },
            ColumnDef {
                name: "command",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "commandArguments",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "workDirectory",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "nice",
                sql: "INTEGER NOT NULL DEFAULT 0",
                admin: true,
            },
            ColumnDef {
                name: "uid",
                sql: "INTEGER",
                admin: true,
            },
            ColumnDef {
                name: "gid",
                sql: "INTEGER",
                admin: true,
            },
            ColumnDef {
                name: "limits",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "startTime",
                sql: "TEXT",
                admin: true,
            },
            ColumnDef {
                name: "endTime",
                sql: "TEXT",
                admin: true,
            },
        ],
    },
    TableDef {
        name: TOKENS_TABLE,
        columns: &[
            ColumnDef {
                name: "token",
                sql: "TEXT NOT NULL DEFAULT '0'",
                admin: true,
            },
            ColumnDef {
                name: "user",
                sql: "TEXT NOT NULL DEFAULT '0'",
                admin: true,
            },
            ColumnDef {
                name: "validUntil",
                sql: "TEXT NOT NULL DEFAULT '0'",
                admin: true,
            },
        ],
    },
    TableDef {
        name: USERS_TABLE,
        columns: &[
            ColumnDef {
                name: "name",
                sql: "TEXT NOT NULL DEFAULT '0'",
                admin: true,
            },
            ColumnDef {
                name: "password",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "email",
                sql: "TEXT",
                admin: false,
            },
            ColumnDef {
                name: "lastLogin",
                sql: "TEXT",
                admin: true,
            },
            ColumnDef {
                name: "limits",
                sql: "TEXT",
                admin: true,
            },
            ColumnDef {
                name: "permissions",
                sql: "INTEGER NOT NULL DEFAULT 0",
                admin: true,
            },
            ColumnDef {
                name: "priority",
                sql: "INTEGER NOT NULL DEFAULT 0",
                admin: true,
            },
        ],
    },
];

/// Ensures every table exists with the auto-increment `_id` primary key and
/// that every known column is present. Failure here is fatal to startup.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for table in SCHEMA {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (`_id` INTEGER PRIMARY KEY AUTOINCREMENT)",
            table.name
        );
        sqlx::query(&create).execute(pool).await?;

        let existing = table_columns(pool, table.name).await?;
        for column in table.columns {
            if existing.iter().any(|name| name == column.name) {
                continue;
            }
            let alter = format!(
                "ALTER TABLE {} ADD `{}` {}",
                table.name, column.name, column.sql
            );
            sqlx::query(&alter).execute(pool).await?;
        }
    }
    Ok(())
}

/// Inserts the administrator row on first run. No-op when a user with the
/// configured name already exists.
pub async fn create_administrator(
    pool: &DbPool,
    name: &str,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT _id FROM users WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!(name, "creating administrator user");
    sqlx::query("INSERT INTO users (name, password, permissions) VALUES (?, ?, ?)")
        .bind(name)
        .bind(password_hash)
        .bind(Permission::SuperAdmin.bit() as i64)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns true when the patch field name is editable only by admins, or is
/// not part of the table schema at all.
pub fn is_admin_field(table: &str, field: &str) -> bool {
    if field == "_id" {
        return true;
    }
    SCHEMA
        .iter()
        .find(|def| def.name == table)
        .and_then(|def| def.columns.iter().find(|column| column.name == field))
        .map(|column| column.admin)
        .unwrap_or(true)
}

async fn table_columns(pool: &DbPool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    let query = format!("PRAGMA table_info({table})");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect())
}
