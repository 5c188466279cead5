//! In-memory bearer-token registry with one-shot expiry timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::token::TokenRow;
use crate::services::events::CoreEvent;
use crate::utils::time;

#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub user: String,
    pub valid_until: DateTime<Utc>,
}

/// Holds every live token. A token is valid while it exists in the map and
/// `now` is before its expiry; each registration arms a timer that removes
/// it and notifies the core.
#[derive(Clone)]
pub struct TokenManager {
    tokens: Arc<Mutex<HashMap<String, TokenEntry>>>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl TokenManager {
    pub fn new(events: mpsc::UnboundedSender<CoreEvent>) -> Self {
        TokenManager {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Issues a new opaque token for the user. The value is a 128-bit
    /// hex string; collisions are not a practical concern.
    pub fn register(&self, user: &str, valid_until: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        tracing::info!(user, %valid_until, "registered token");
        self.load(&token, user, valid_until);
        token
    }

    /// Inserts a token and arms its expiry timer.
    pub fn load(&self, token: &str, user: &str, valid_until: DateTime<Utc>) {
        {
            let mut tokens = self.tokens.lock().expect("token lock");
            tokens.insert(
                token.to_string(),
                TokenEntry {
                    user: user.to_string(),
                    valid_until,
                },
            );
        }
        self.schedule_expiry(token.to_string(), valid_until);
    }

    /// Loads persisted tokens after a restart, skipping rows that are
    /// malformed or already expired.
    pub fn load_all(&self, rows: &[TokenRow]) {
        let now = time::now_utc();
        for row in rows {
            match time::parse_timestamp(&row.valid_until) {
                Some(valid_until) if valid_until > now => {
                    self.load(&row.token, &row.user, valid_until);
                }
                Some(_) => {}
                None => {
                    tracing::warn!(token = %row.token, "skipping token with malformed expiry");
                }
            }
        }
    }

    /// User the token belongs to; empty result for unknown or expired
    /// values.
    pub fn user_for(&self, token: &str) -> Option<String> {
        let tokens = self.tokens.lock().expect("token lock");
        tokens
            .get(token)
            .filter(|entry| entry.valid_until > time::now_utc())
            .map(|entry| entry.user.clone())
    }

    pub fn expiration_of(&self, token: &str) -> Option<DateTime<Utc>> {
        let tokens = self.tokens.lock().expect("token lock");
        tokens.get(token).map(|entry| entry.valid_until)
    }

    /// Drops the token and signals the expiry; no-op when the token is
    /// already gone.
    pub fn expire(&self, token: &str) {
        let removed = {
            let mut tokens = self.tokens.lock().expect("token lock");
            tokens.remove(token).is_some()
        };
        if removed {
            tracing::debug!(token, "token expired");
            let _ = self.events.send(CoreEvent::TokenExpired {
                token: token.to_string(),
            });
        }
    }

    fn schedule_expiry(&self, token: String, valid_until: DateTime<Utc>) {
        let manager = self.clone();
        tokio::spawn(async move {
            let delay = (valid_until - time::now_utc())
                .to_std()
                .unwrap_or_default();
            tokio::time::sleep(delay).await;
            manager.expire(&token);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn manager() -> (TokenManager, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TokenManager::new(tx), rx)
    }

    #[tokio::test]
    async fn registered_tokens_resolve_until_expiry() {
        let (manager, _rx) = manager();
        let token = manager.register("alice", time::now_utc() + Duration::days(1));
        assert_eq!(manager.user_for(&token).as_deref(), Some("alice"));
        assert!(manager.expiration_of(&token).is_some());
        assert_eq!(manager.user_for("unknown"), None);
    }

    #[tokio::test]
    async fn tokens_are_distinct() {
        let (manager, _rx) = manager();
        let until = time::now_utc() + Duration::days(1);
        let first = manager.register("alice", until);
        let second = manager.register("alice", until);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn expiry_timer_removes_the_token() {
        let (manager, mut rx) = manager();
        let token = manager.register("alice", time::now_utc() + Duration::milliseconds(50));
        assert!(manager.user_for(&token).is_some());

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(manager.user_for(&token), None);
        match rx.recv().await.expect("event") {
            CoreEvent::TokenExpired { token: expired } => assert_eq!(expired, token),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_all_skips_expired_rows() {
        let (manager, _rx) = manager();
        let rows = vec![
            TokenRow {
                id: 1,
                token: "stale".into(),
                user: "alice".into(),
                valid_until: "2020-01-01T00:00:00.000Z".into(),
            },
            TokenRow {
                id: 2,
                token: "live".into(),
                user: "alice".into(),
                valid_until: time::to_timestamp(time::now_utc() + Duration::days(1)),
            },
        ];
        manager.load_all(&rows);
        assert_eq!(manager.user_for("stale"), None);
        assert_eq!(manager.user_for("live").as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn manual_expiry_signals_once() {
        let (manager, mut rx) = manager();
        let token = manager.register("alice", time::now_utc() + Duration::days(1));
        manager.expire(&token);
        manager.expire(&token);
        assert!(matches!(
            rx.try_recv().expect("event"),
            CoreEvent::TokenExpired { .. }
        ));
        assert!(rx.try_recv().is_err());
    }
}
