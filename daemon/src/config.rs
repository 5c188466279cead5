use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use config::{Config as RawConfig, File, FileFormat};

/// Administrator bootstrap settings from the `[Administrator]` section.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    /// Already-hashed administrator password (SHA-512 hex over
    /// `password || salt`).
    pub password: String,
    /// Process-wide password salt.
    pub salt: String,
}

/// Database settings from the `[Database]` section.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub driver: String,
    pub hostname: String,
    pub password: String,
    pub path: String,
    pub port: u16,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub administrator: AdminConfig,
    pub database: DatabaseConfig,
}

impl DaemonConfig {
    /// Loads the INI configuration. Missing file and missing keys fall back
    /// to defaults; the administrator password has no default and must be
    /// present for the bootstrap row to be usable.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = RawConfig::builder()
            .add_source(
                File::new(
                    path.to_str()
                        .ok_or_else(|| anyhow!("configuration path is not valid UTF-8"))?,
                    FileFormat::Ini,
                )
                .required(false),
            )
            .build()
            .with_context(|| format!("could not read configuration from {}", path.display()))?;

        let get = |key: &str, default: &str| -> String {
            raw.get_string(key).unwrap_or_else(|_| default.to_string())
        };

        let default_db = env::temp_dir().join("queued.db");
        Ok(DaemonConfig {
            administrator: AdminConfig {
                username: get("administrator.username", "root"),
                password: get("administrator.password", ""),
                salt: get("administrator.salt", ""),
            },
            database: DatabaseConfig {
                driver: get("database.driver", "sqlite"),
                hostname: get("database.hostname", ""),
                password: get("database.password", ""),
                path: get("database.path", &default_db.to_string_lossy()),
                port: raw.get_int("database.port").unwrap_or(0) as u16,
                username: get("database.username", ""),
            },
        })
    }

    /// Default configuration file location: `QUEUED_CONFIG`, then the XDG
    /// config directory, then `/etc/queued`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("QUEUED_CONFIG") {
            return PathBuf::from(path);
        }
        if let Ok(base) = env::var("XDG_CONFIG_HOME") {
            return Path::new(&base).join("queued/queued.ini");
        }
        if let Ok(home) = env::var("HOME") {
            return Path::new(&home).join(".config/queued/queued.ini");
        }
        PathBuf::from("/etc/queued/queued.ini")
    }

    /// Connection URL for the configured database. Only the sqlite driver is
    /// supported; the name is accepted case-insensitively.
    pub fn database_url(&self) -> anyhow::Result<String> {
        match self.database.driver.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "qsqlite" => Ok(format!("sqlite://{}", self.database.path)),
            other => Err(anyhow!("unsupported database driver: {other}")),
        }
    }
}
