//! Typed advanced-setting cache over the settings table. Lookup is
//! case-insensitive; unknown keys fall back to the declared defaults below.
//! `Plugin.<name>.<key>` entries bypass the defaults table and are always
//! admin-only.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::db::schema::DATABASE_VERSION;
use crate::models::setting::SettingRow;
use crate::services::events::CoreEvent;

/// Identifiers for the recognized settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Invalid,
    DatabaseInterval,
    DatabaseVersion,
    DefaultLimits,
    KeepTasks,
    KeepUsers,
    OnExitAction,
    Plugins,
    ServerAddress,
    ServerMaxConnections,
    ServerPort,
    ServerTimeout,
    TokenExpiration,
}

struct SettingDefault {
    key: SettingKey,
    name: &'static str,
    value: &'static str,
    admin: bool,
}

const DEFAULTS: &[SettingDefault] = &[
    SettingDefault {
        key: SettingKey::DatabaseInterval,
        name: "DatabaseInterval",
        value: "86400000",
        admin: true,
    },
    SettingDefault {
        key: SettingKey::DatabaseVersion,
        name: "DatabaseVersion",
        value: "3",
        admin: true,
    },
    SettingDefault {
        key: SettingKey::DefaultLimits,
        name: "DefaultLimits",
        value: "0\n0\n0\n0\n0",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::KeepTasks,
        name: "KeepTasks",
        value: "0",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::KeepUsers,
        name: "KeepUsers",
        value: "0",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::OnExitAction,
        name: "OnExitAction",
        value: "2",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::Plugins,
        name: "Plugins",
        value: "",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::ServerAddress,
        name: "ServerAddress",
        value: "",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::ServerMaxConnections,
        name: "ServerMaxConnections",
        value: "30",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::ServerPort,
        name: "ServerPort",
        value: "8080",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::ServerTimeout,
        name: "ServerTimeout",
        value: "-1",
        admin: false,
    },
    SettingDefault {
        key: SettingKey::TokenExpiration,
        name: "TokenExpiration",
        value: "30",
        admin: false,
    },
];

fn default_for(key: &str) -> Option<&'static SettingDefault> {
    DEFAULTS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(key))
}

fn default_by_id(key: SettingKey) -> Option<&'static SettingDefault> {
    DEFAULTS.iter().find(|entry| entry.key == key)
}

fn is_plugin_key(key: &str) -> bool {
    key.len() > "plugin.".len()
        && key
            .get(.."plugin.".len())
            .map(|prefix| prefix.eq_ignore_ascii_case("plugin."))
            .unwrap_or(false)
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, String>,
    ids: HashMap<String, i64>,
}

pub struct Settings {
    inner: RwLock<Inner>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl Settings {
    pub fn new(events: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Settings {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Maps a textual key onto the recognized-settings enum.
    pub fn internal_key(key: &str) -> SettingKey {
        default_for(key).map(|entry| entry.key).unwrap_or(SettingKey::Invalid)
    }

    /// Canonical (documented) spelling of a recognized setting.
    pub fn canonical_name(key: SettingKey) -> &'static str {
        default_by_id(key).map(|entry| entry.name).unwrap_or("")
    }

    /// Stored value, or the declared default for recognized keys, or the
    /// empty string.
    pub fn get(&self, key: &str) -> String {
        let inner = self.inner.read().expect("settings lock");
        if let Some(value) = inner.values.get(&key.to_ascii_lowercase()) {
            return value.clone();
        }
        default_for(key)
            .map(|entry| entry.value.to_string())
            .unwrap_or_default()
    }

    pub fn get_known(&self, key: SettingKey) -> String {
        self.get(Self::canonical_name(key))
    }

    pub fn get_known_i64(&self, key: SettingKey) -> i64 {
        let raw = self.get_known(key);
        raw.parse().unwrap_or_else(|_| {
            default_by_id(key)
                .and_then(|entry| entry.value.parse().ok())
                .unwrap_or(0)
        })
    }

    /// Row id of the stored setting, `-1` when the key has never been
    /// persisted.
    pub fn id_of(&self, key: &str) -> i64 {
        let inner = self.inner.read().expect("settings lock");
        inner
            .ids
            .get(&key.to_ascii_lowercase())
            .copied()
            .unwrap_or(-1)
    }

    pub fn set_id(&self, key: &str, id: i64) {
        let mut inner = self.inner.write().expect("settings lock");
        inner.ids.insert(key.to_ascii_lowercase(), id);
    }

    /// Whether changing (or reading) the key requires admin permissions.
    pub fn is_admin(&self, key: &str) -> bool {
        if is_plugin_key(key) {
            return true;
        }
        default_for(key).map(|entry| entry.admin).unwrap_or(false)
    }

    /// Updates the cached value and notifies the core.
    pub fn set(&self, key: &str, value: &str) {
        {
            let mut inner = self.inner.write().expect("settings lock");
            inner
                .values
                .insert(key.to_ascii_lowercase(), value.to_string());
        }
        let _ = self.events.send(CoreEvent::SettingChanged {
            key: Self::internal_key(key),
            name: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Primes the cache from stored rows without emitting change events;
    /// used once at startup before any listener is interested.
    pub fn bulk_load(&self, rows: &[SettingRow]) {
        let mut inner = self.inner.write().expect("settings lock");
        for row in rows {
            let key = row.key.to_ascii_lowercase();
            inner.ids.insert(key.clone(), row.id);
            inner
                .values
                .insert(key, row.value.clone().unwrap_or_default());
        }
    }

    /// True when the stored schema marker matches the compiled-in version.
    pub fn check_database_version(&self) -> bool {
        let stored = {
            let inner = self.inner.read().expect("settings lock");
            inner
                .values
                .get(&Self::canonical_name(SettingKey::DatabaseVersion).to_ascii_lowercase())
                .cloned()
        };
        match stored {
            Some(value) => value.parse::<i64>().ok() == Some(DATABASE_VERSION),
            None => false,
        }
    }
}
