//! Plugin event bus and registry. The daemon hosts no plugin code in-tree;
//! extensions subscribe to the broadcast bus and receive the fixed event
//! set below together with an admin-equivalent token minted at startup.
//! Dispatch is fire-and-forget: a slow or absent subscriber never blocks
//! the scheduler.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

/// The complete event contract offered to extensions.
#[derive(Debug, Clone)]
pub enum PluginEvent {
    AddTask(i64),
    EditTask(i64, Value),
    StartTask(i64),
    StopTask(i64),
    AddUser(i64),
    EditUser(i64, Value),
    AddPlugin(String),
    RemovePlugin(String),
    EditOption(String, Value),
}

pub struct PluginManager {
    names: Mutex<Vec<String>>,
    token: Mutex<String>,
    bus: broadcast::Sender<PluginEvent>,
}

impl PluginManager {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(64);
        PluginManager {
            names: Mutex::new(Vec::new()),
            token: Mutex::new(String::new()),
            bus,
        }
    }

    /// The admin-equivalent bearer token handed to plugin hosts.
    pub fn token(&self) -> String {
        self.token.lock().expect("token lock").clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token.lock().expect("token lock") = token;
    }

    /// Primes the registry from the newline-separated plugin list setting.
    pub fn load_names(&self, raw: &str) {
        let mut names = self.names.lock().expect("names lock");
        *names = raw
            .split('\n')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn list(&self) -> Vec<String> {
        self.names.lock().expect("names lock").clone()
    }

    /// The newline-separated encoding stored in the plugin list setting.
    pub fn encoded(&self) -> String {
        self.list().join("\n")
    }

    /// Registers a plugin name; false when it is already loaded.
    pub fn insert(&self, name: &str) -> bool {
        let mut names = self.names.lock().expect("names lock");
        if names.iter().any(|existing| existing == name) {
            return false;
        }
        names.push(name.to_string());
        true
    }

    /// Removes a plugin name; false when it was not loaded.
    pub fn remove(&self, name: &str) -> bool {
        let mut names = self.names.lock().expect("names lock");
        let before = names.len();
        names.retain(|existing| existing != name);
        names.len() != before
    }

    /// Subscription handle for a plugin host.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.bus.subscribe()
    }

    /// Publishes an event. Nobody listening is the normal case.
    pub fn notify(&self, event: PluginEvent) {
        tracing::debug!(?event, "plugin event");
        let _ = self.bus.send(event);
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_the_encoded_setting() {
        let manager = PluginManager::new();
        manager.load_names("first\nsecond");
        assert_eq!(manager.list(), vec!["first", "second"]);
        assert_eq!(manager.encoded(), "first\nsecond");
        manager.load_names("");
        assert!(manager.list().is_empty());
    }

    #[test]
    fn insert_and_remove_report_membership_changes() {
        let manager = PluginManager::new();
        assert!(manager.insert("notify"));
        assert!(!manager.insert("notify"));
        assert!(manager.remove("notify"));
        assert!(!manager.remove("notify"));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let manager = PluginManager::new();
        let mut rx = manager.subscribe();
        manager.notify(PluginEvent::AddTask(7));
        match rx.recv().await.expect("event") {
            PluginEvent::AddTask(id) => assert_eq!(id, 7),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn notify_without_subscribers_is_harmless() {
        let manager = PluginManager::new();
        manager.notify(PluginEvent::RemovePlugin("gone".into()));
    }
}
