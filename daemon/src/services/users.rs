//! In-memory user registry: password verification, permission tests and
//! token issuance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha512};
use tokio::sync::mpsc;

use crate::models::limits::Limits;
use crate::models::permissions::{has_permission, Permission};
use crate::models::user::{UserPatch, UserRow};
use crate::services::events::CoreEvent;
use crate::services::tokens::TokenManager;
use crate::utils::time;

/// Expiry applied to internally minted tokens (plugin host identity).
const SERVICE_TOKEN_DAYS: i64 = 9999;

#[derive(Debug, Clone)]
pub struct UserEntry {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub permissions: u32,
    pub priority: i64,
    pub limits: String,
}

impl UserEntry {
    pub fn from_row(row: &UserRow) -> Self {
        UserEntry {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone().unwrap_or_default(),
            password_hash: row.password.clone().unwrap_or_default(),
            permissions: row.permissions as u32,
            priority: row.priority,
            limits: row.limits.clone().unwrap_or_default(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        has_permission(self.permissions, permission)
    }

    pub fn native_limits(&self) -> Limits {
        Limits::parse(&self.limits)
    }
}

/// SHA-512 hex digest over `password || salt`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct UserManager {
    users: Arc<Mutex<HashMap<String, UserEntry>>>,
    tokens: TokenManager,
    salt: String,
    token_expiration_days: Arc<AtomicI64>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl UserManager {
    pub fn new(
        tokens: TokenManager,
        events: mpsc::UnboundedSender<CoreEvent>,
        salt: String,
    ) -> Self {
        UserManager {
            users: Arc::new(Mutex::new(HashMap::new())),
            tokens,
            salt,
            token_expiration_days: Arc::new(AtomicI64::new(30)),
            events,
        }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn hash(&self, password: &str) -> String {
        hash_password(password, &self.salt)
    }

    pub fn set_token_expiration(&self, days: i64) {
        self.token_expiration_days.store(days, Ordering::Relaxed);
    }

    /// Registers a user; refuses duplicates by name.
    pub fn add(&self, entry: UserEntry) -> bool {
        let mut users = self.users.lock().expect("user lock");
        if users.contains_key(&entry.name) {
            tracing::warn!(name = %entry.name, "user already exists");
            return false;
        }
        users.insert(entry.name.clone(), entry);
        true
    }

    pub fn load_all(&self, rows: &[UserRow]) {
        for row in rows {
            self.add(UserEntry::from_row(row));
        }
    }

    pub fn by_name(&self, name: &str) -> Option<UserEntry> {
        let users = self.users.lock().expect("user lock");
        users.get(name).cloned()
    }

    pub fn by_id(&self, id: i64) -> Option<UserEntry> {
        let users = self.users.lock().expect("user lock");
        users.values().find(|entry| entry.id == id).cloned()
    }

    /// Resolves a token to its user.
    pub fn by_token(&self, token: &str) -> Option<UserEntry> {
        let name = self.tokens.user_for(token)?;
        self.by_name(&name)
    }

    /// System uid/gid for the user, resolved through the passwd database by
    /// name; `(1, 1)` when the account is unknown to the OS.
    pub fn ids(&self, id: i64) -> (u32, u32) {
        let fallback = (1, 1);
        let Some(entry) = self.by_id(id) else {
            tracing::warn!(id, "no user found for id lookup");
            return fallback;
        };
        match nix::unistd::User::from_name(&entry.name) {
            Ok(Some(account)) => (account.uid.as_raw(), account.gid.as_raw()),
            Ok(None) => {
                tracing::warn!(name = %entry.name, "no system user found by name");
                fallback
            }
            Err(err) => {
                tracing::warn!(name = %entry.name, %err, "passwd lookup failed");
                fallback
            }
        }
    }

    /// Password login. Returns a fresh token and emits the login event, or
    /// nothing when the user is unknown or the password does not match.
    pub fn authorize(&self, name: &str, password: &str) -> Option<String> {
        let entry = self.by_name(name)?;
        if entry.password_hash != self.hash(password) {
            tracing::info!(name, "password mismatch");
            return None;
        }

        let now = time::now_utc();
        let expiry = now + Duration::days(self.token_expiration_days.load(Ordering::Relaxed));
        let _ = self.events.send(CoreEvent::UserLoggedIn {
            id: entry.id,
            time: now,
        });
        Some(self.tokens.register(name, expiry))
    }

    /// Administrative token minting without a password check; used once at
    /// startup for the plugin host identity.
    pub fn authorize_unchecked(&self, name: &str) -> String {
        let expiry = time::now_utc() + Duration::days(SERVICE_TOKEN_DAYS);
        self.tokens.register(name, expiry)
    }

    /// True when the token is valid and its user holds the permission.
    pub fn authorize_service(&self, token: &str, permission: Permission) -> bool {
        match self.by_token(token) {
            Some(entry) => entry.has_permission(permission),
            None => false,
        }
    }

    /// Expiry and validity of a token.
    pub fn check_token(&self, token: &str) -> (Option<DateTime<Utc>>, bool) {
        let valid = self.tokens.user_for(token).is_some();
        (self.tokens.expiration_of(token), valid)
    }

    /// Applies an already-persisted partial edit to the in-memory entry.
    pub fn apply_patch(&self, id: i64, patch: &UserPatch) {
        let mut users = self.users.lock().expect("user lock");
        let Some(name) = users
            .values()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.clone())
        else {
            return;
        };

        let mut entry = users.remove(&name).expect("entry present");
        if let Some(new_name) = &patch.name {
            entry.name = new_name.clone();
        }
        if let Some(password) = &patch.password {
            entry.password_hash = password.clone();
        }
        if let Some(email) = &patch.email {
            entry.email = email.clone();
        }
        if let Some(limits) = &patch.limits {
            entry.limits = limits.clone();
        }
        if let Some(permissions) = patch.permissions {
            entry.permissions = permissions as u32;
        }
        if let Some(priority) = patch.priority {
            entry.priority = priority;
        }
        users.insert(entry.name.clone(), entry);
    }

    pub fn set_permissions_value(&self, id: i64, permissions: u32) {
        let mut users = self.users.lock().expect("user lock");
        if let Some(entry) = users.values_mut().find(|entry| entry.id == id) {
            entry.permissions = permissions;
        }
    }
}
