//! Internal change events. Components never hold references to each other;
//! they emit these through a narrow sink and the core facade reacts,
//! persisting timestamps and fanning configuration out to the interested
//! parties.

use chrono::{DateTime, Utc};

use crate::services::settings::SettingKey;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A task's child process became runnable.
    TaskStarted { id: i64, time: DateTime<Utc> },
    /// A task's child process exited.
    TaskFinished { id: i64, time: DateTime<Utc> },
    /// A user authenticated successfully.
    UserLoggedIn { id: i64, time: DateTime<Utc> },
    /// A token reached its expiry and was dropped from the live map.
    TokenExpired { token: String },
    /// An advanced setting changed value.
    SettingChanged {
        key: SettingKey,
        name: String,
        value: String,
    },
}
