//! The core facade. Every externally reachable operation passes through
//! here and follows the same gate: resolve the token to a user, test the
//! permission rule, project non-admin payloads, write to the store first
//! and to the owning component second, then notify plugins. The facade
//! itself keeps no state; it orchestrates the component owners.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::DaemonConfig;
use crate::db::connection::DbPool;
use crate::db::schema::{self, DATABASE_VERSION};
use crate::error::{AppError, AppResult};
use crate::models::limits::{minimal_limits, Limits};
use crate::models::permissions::Permission;
use crate::models::task::{NewTask, TaskPatch, TaskRow};
use crate::models::user::{NewUser, UserPatch, UserRow};
use crate::repositories;
use crate::services::events::CoreEvent;
use crate::services::plugins::{PluginEvent, PluginManager};
use crate::services::process::ExitAction;
use crate::services::retention::{self, RetentionSettings};
use crate::services::scheduler::Scheduler;
use crate::services::settings::{SettingKey, Settings};
use crate::services::tokens::TokenManager;
use crate::services::users::{UserEntry, UserManager};
use crate::utils::system::HostResources;
use crate::utils::time;

/// A task submission after wire-level parsing.
#[derive(Debug, Clone, Default)]
pub struct TaskSubmission {
    pub command: String,
    pub arguments: Vec<String>,
    pub working_directory: Option<String>,
    /// Target owner; `None` submits on the caller's own behalf.
    pub user: Option<i64>,
    pub nice: i64,
    pub limits: Limits,
}

/// A user creation request after wire-level parsing.
#[derive(Debug, Clone, Default)]
pub struct UserSubmission {
    pub name: String,
    pub email: String,
    /// Plain text; hashed with the process salt before it is stored.
    pub password: String,
    pub permissions: i64,
    pub priority: i64,
    pub limits: Limits,
}

pub struct Core {
    pool: DbPool,
    host: HostResources,
    admin_name: String,
    pub settings: Settings,
    pub tokens: TokenManager,
    pub users: UserManager,
    pub scheduler: Scheduler,
    pub plugins: PluginManager,
    retention: watch::Sender<RetentionSettings>,
}

impl Core {
    /// Brings the daemon core up: schema bootstrap, administrator seeding,
    /// component loading in dependency order, then one admission pass over
    /// the unfinished tasks. A failing schema bootstrap is fatal.
    pub async fn init(
        config: &DaemonConfig,
        pool: DbPool,
        host: HostResources,
    ) -> anyhow::Result<Arc<Core>> {
        schema::ensure_schema(&pool).await?;
        schema::create_administrator(
            &pool,
            &config.administrator.username,
            &config.administrator.password,
        )
        .await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let settings = Settings::new(events_tx.clone());
        match repositories::settings::list(&pool).await {
            Ok(rows) => settings.bulk_load(&rows),
            Err(err) => tracing::warn!(%err, "could not load settings"),
        }

        let tokens = TokenManager::new(events_tx.clone());
        let users = UserManager::new(
            tokens.clone(),
            events_tx.clone(),
            config.administrator.salt.clone(),
        );
        users.set_token_expiration(settings.get_known_i64(SettingKey::TokenExpiration));

        let now = time::now_timestamp();
        if let Err(err) = repositories::tokens::remove_expired(&pool, &now).await {
            tracing::warn!(%err, "could not drop expired tokens");
        }
        match repositories::tokens::list(&pool).await {
            Ok(rows) => tokens.load_all(&rows),
            Err(err) => tracing::warn!(%err, "could not load tokens"),
        }
        match repositories::users::list(&pool).await {
            Ok(rows) => users.load_all(&rows),
            Err(err) => tracing::warn!(%err, "could not load users"),
        }

        let scheduler = Scheduler::new(host, events_tx.clone());
        scheduler.set_exit_action(ExitAction::from_setting(
            settings.get_known_i64(SettingKey::OnExitAction),
        ));

        let plugins = PluginManager::new();
        plugins.set_token(users.authorize_unchecked(&config.administrator.username));
        plugins.load_names(&settings.get_known(SettingKey::Plugins));

        let (retention_tx, retention_rx) = watch::channel(RetentionSettings {
            interval_ms: settings.get_known_i64(SettingKey::DatabaseInterval),
            keep_tasks_ms: settings.get_known_i64(SettingKey::KeepTasks),
            keep_users_ms: settings.get_known_i64(SettingKey::KeepUsers),
        });
        retention::spawn(pool.clone(), retention_rx);

        let core = Arc::new(Core {
            pool,
            host,
            admin_name: config.administrator.username.clone(),
            settings,
            tokens,
            users,
            scheduler,
            plugins,
            retention: retention_tx,
        });

        if !core.settings.check_database_version() {
            tracing::info!(version = DATABASE_VERSION, "bumping database version");
            core.write_option(
                Settings::canonical_name(SettingKey::DatabaseVersion),
                &DATABASE_VERSION.to_string(),
            )
            .await?;
        }

        match repositories::tasks::unfinished(&core.pool).await {
            Ok(rows) => core.scheduler.load(&rows),
            Err(err) => tracing::warn!(%err, "could not load unfinished tasks"),
        }
        core.scheduler.trigger();

        Core::spawn_event_loop(core.clone(), events_rx);
        Ok(core)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn host(&self) -> HostResources {
        self.host
    }

    pub fn hash_password(&self, password: &str) -> String {
        self.users.hash(password)
    }

    // ------------------------------------------------------------------
    // authentication
    // ------------------------------------------------------------------

    /// Password login; issues and persists a fresh token.
    pub async fn auth(&self, name: &str, password: &str) -> AppResult<String> {
        let token = self.users.authorize(name, password).ok_or_else(|| {
            AppError::InvalidPassword("Invalid username or password".to_string())
        })?;

        let (valid_until, _) = self.users.check_token(&token);
        if let Some(valid_until) = valid_until {
            if let Err(err) = repositories::tokens::insert(
                &self.pool,
                &token,
                name,
                &time::to_timestamp(valid_until),
            )
            .await
            {
                tracing::warn!(%err, "could not persist token");
            }
        }
        Ok(token)
    }

    /// Token validity check.
    pub fn authorization(&self, token: &str) -> bool {
        self.users.check_token(token).1
    }

    fn require_user(&self, token: &str) -> AppResult<UserEntry> {
        self.users
            .by_token(token)
            .ok_or_else(AppError::invalid_token)
    }

    fn require_permission(&self, token: &str, permission: Permission) -> AppResult<()> {
        if self.users.authorize_service(token, permission) {
            Ok(())
        } else {
            Err(AppError::not_allowed())
        }
    }

    // ------------------------------------------------------------------
    // tasks
    // ------------------------------------------------------------------

    /// Admission-controlled submission. Self-owned submissions need the
    /// `Job` permission, placing work for another user needs `Admin`. The
    /// nice value is clamped to the owner's priority and the limits to the
    /// minimum of task, owner and configured defaults.
    pub async fn add_task(&self, submission: TaskSubmission, token: &str) -> AppResult<i64> {
        let auth_user = self.require_user(token)?;
        let owner_id = match submission.user {
            Some(id) if id >= 0 => id,
            _ => auth_user.id,
        };
        if owner_id == auth_user.id {
            self.require_permission(token, Permission::Job)?;
        } else {
            self.require_permission(token, Permission::Admin)?;
        }

        let owner = self
            .users
            .by_id(owner_id)
            .ok_or_else(|| AppError::InvalidArgument("User does not exist".to_string()))?;
        let (uid, gid) = self.users.ids(owner_id);
        let default_limits =
            Limits::parse(&self.settings.get_known(SettingKey::DefaultLimits));
        let limits = minimal_limits(submission.limits, owner.native_limits(), default_limits);
        let nice = submission.nice.clamp(0, owner.priority);

        let task = NewTask {
            user: owner_id,
            command: submission.command,
            command_arguments: submission.arguments.join("\n"),
            work_directory: submission.working_directory.unwrap_or_default(),
            nice,
            uid: uid as i64,
            gid: gid as i64,
            limits: limits.encode(),
        };
        let id = repositories::tasks::insert(&self.pool, &task)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;

        let row = repositories::tasks::by_id(&self.pool, id)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::Error("task row vanished".to_string()))?;
        self.scheduler.add(&row);
        self.plugins.notify(PluginEvent::AddTask(id));
        Ok(id)
    }

    /// Partial task edit. Owners need `Job` while the task is pending;
    /// anything already started, and any foreign task, needs `Admin`.
    pub async fn edit_task(&self, id: i64, patch: TaskPatch, token: &str) -> AppResult<()> {
        let row = repositories::tasks::by_id(&self.pool, id)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::InvalidArgument("Task does not exist".to_string()))?;

        let auth_user = self.require_user(token)?;
        let is_admin = self.users.authorize_service(token, Permission::Admin);
        if auth_user.id == row.user {
            if !self.users.authorize_service(token, Permission::Job) {
                return Err(AppError::not_allowed());
            }
        } else if !is_admin {
            return Err(AppError::not_allowed());
        }
        if row.start_time.is_some() && !is_admin {
            return Err(AppError::not_allowed());
        }

        let mut payload = if is_admin {
            patch
        } else {
            patch.drop_admin_fields()
        };
        if let Some(nice) = payload.nice {
            payload.nice = Some(nice.clamp(0, auth_user.priority));
        }

        repositories::tasks::update(&self.pool, id, &payload)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;
        self.scheduler.apply_patch(id, &payload);
        self.plugins.notify(PluginEvent::EditTask(
            id,
            serde_json::to_value(&payload).unwrap_or(Value::Null),
        ));
        Ok(())
    }

    fn require_task_control(&self, token: &str, owner: i64) -> AppResult<()> {
        let auth_user = self.require_user(token)?;
        if auth_user.id == owner {
            self.require_permission(token, Permission::Job)
        } else {
            self.require_permission(token, Permission::Admin)
        }
    }

    /// Forced start, bypassing admission.
    pub async fn start_task(&self, id: i64, token: &str) -> AppResult<()> {
        let row = repositories::tasks::by_id(&self.pool, id)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::InvalidArgument("Task does not exist".to_string()))?;
        self.require_task_control(token, row.user)?;
        if !self.scheduler.contains(id) {
            self.scheduler.load(std::slice::from_ref(&row));
        }
        self.scheduler.force_start(id);
        Ok(())
    }

    /// Forced stop; honors the current exit action.
    pub async fn stop_task(&self, id: i64, token: &str) -> AppResult<()> {
        if !self.scheduler.contains(id) {
            return Err(AppError::InvalidArgument("Task does not exist".to_string()));
        }
        let row = repositories::tasks::by_id(&self.pool, id)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::InvalidArgument("Task does not exist".to_string()))?;
        self.require_task_control(token, row.user)?;
        self.scheduler.force_stop(id);
        Ok(())
    }

    /// Task row, visible to admins and the owner.
    pub async fn task(&self, id: i64, token: &str) -> AppResult<TaskRow> {
        let row = repositories::tasks::by_id(&self.pool, id)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::InvalidArgument("Task does not exist".to_string()))?;
        let auth_user = self.require_user(token)?;
        if auth_user.id == row.user || self.users.authorize_service(token, Permission::Admin) {
            Ok(row)
        } else {
            Err(AppError::not_allowed())
        }
    }

    /// Filtered task listing. `user = -1` (or `None`) reads as "the caller
    /// themselves"; anything else requires the `Reports` permission.
    pub async fn task_report(
        &self,
        user: Option<i64>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        token: &str,
    ) -> AppResult<Vec<TaskRow>> {
        let auth_user = self.require_user(token)?;
        let effective = match user {
            Some(id) if id >= 0 => id,
            _ => auth_user.id,
        };
        if effective != auth_user.id {
            self.require_permission(token, Permission::Reports)?;
        }
        let from = from.map(time::to_timestamp);
        let to = to.map(time::to_timestamp);
        repositories::tasks::report(&self.pool, Some(effective), from.as_deref(), to.as_deref())
            .await
            .map_err(|err| AppError::Error(err.to_string()))
    }

    // ------------------------------------------------------------------
    // users
    // ------------------------------------------------------------------

    /// Admin-only user creation.
    pub async fn add_user(&self, submission: UserSubmission, token: &str) -> AppResult<i64> {
        self.require_permission(token, Permission::Admin)?;
        if self.users.by_name(&submission.name).is_some() {
            return Err(AppError::InvalidArgument("User already exists".to_string()));
        }

        let user = NewUser {
            name: submission.name.clone(),
            password_hash: self.users.hash(&submission.password),
            email: submission.email.clone(),
            permissions: submission.permissions,
            priority: submission.priority,
            limits: submission.limits.encode(),
        };
        let id = repositories::users::insert(&self.pool, &user)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;

        self.users.add(UserEntry {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            permissions: user.permissions as u32,
            priority: user.priority,
            limits: user.limits,
        });
        self.plugins.notify(PluginEvent::AddUser(id));
        Ok(id)
    }

    /// Partial user edit: self-edits keep non-admin fields, everything
    /// else requires `Admin`.
    pub async fn edit_user(&self, id: i64, patch: UserPatch, token: &str) -> AppResult<()> {
        self.users
            .by_id(id)
            .ok_or_else(|| AppError::InvalidArgument("User does not exist".to_string()))?;
        let auth_user = self.require_user(token)?;
        let is_admin = self.users.authorize_service(token, Permission::Admin);
        if auth_user.id != id && !is_admin {
            return Err(AppError::not_allowed());
        }

        let payload = if is_admin {
            patch
        } else {
            patch.drop_admin_fields()
        };

        repositories::users::update(&self.pool, id, &payload)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;
        self.users.apply_patch(id, &payload);
        self.plugins.notify(PluginEvent::EditUser(
            id,
            serde_json::to_value(&payload).unwrap_or(Value::Null),
        ));
        Ok(())
    }

    /// Adds or removes one permission bit. The store write happens before
    /// the in-memory mask changes, so a failing write leaves the runtime
    /// permissions untouched.
    pub async fn edit_user_permission(
        &self,
        id: i64,
        permission: Permission,
        add: bool,
        token: &str,
    ) -> AppResult<()> {
        self.require_permission(token, Permission::Admin)?;
        if permission == Permission::Invalid {
            return Err(AppError::InvalidArgument("Invalid permission".to_string()));
        }
        let entry = self
            .users
            .by_id(id)
            .ok_or_else(|| AppError::InvalidArgument("User does not exist".to_string()))?;

        let updated = if add {
            entry.permissions | permission.bit()
        } else {
            entry.permissions & !permission.bit()
        };

        repositories::users::set_permissions(&self.pool, id, updated as i64)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;
        self.users.set_permissions_value(id, updated);
        Ok(())
    }

    /// User row by name, visible to admins and the user themselves.
    pub async fn user(&self, name: &str, token: &str) -> AppResult<UserRow> {
        let row = repositories::users::by_name(&self.pool, name)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?
            .ok_or_else(|| AppError::InvalidArgument("User does not exist".to_string()))?;
        let auth_user = self.require_user(token)?;
        if auth_user.id == row.id || self.users.authorize_service(token, Permission::Admin) {
            Ok(row)
        } else {
            Err(AppError::not_allowed())
        }
    }

    /// Filtered user listing; requires `Reports`.
    pub async fn user_report(
        &self,
        last_logged: Option<DateTime<Utc>>,
        permission: Option<Permission>,
        token: &str,
    ) -> AppResult<Vec<UserRow>> {
        self.require_permission(token, Permission::Reports)?;
        let last_logged = last_logged.map(time::to_timestamp);
        let mask = permission
            .filter(|permission| *permission != Permission::Invalid)
            .map(|permission| permission.bit() as i64);
        repositories::users::report(&self.pool, last_logged.as_deref(), mask)
            .await
            .map_err(|err| AppError::Error(err.to_string()))
    }

    /// Per-user usage aggregation. Without the `Reports` permission the
    /// output is filtered down to the caller's own row.
    pub async fn performance_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        token: &str,
    ) -> AppResult<Vec<crate::services::reports::PerformanceEntry>> {
        let auth_user = self.require_user(token)?;
        let report =
            crate::services::reports::performance(&self.pool, &self.users, self.host, from, to)
                .await
                .map_err(|err| AppError::Error(err.to_string()))?;
        if self.users.authorize_service(token, Permission::Reports) {
            Ok(report)
        } else {
            Ok(report
                .into_iter()
                .filter(|entry| entry.id == auth_user.id)
                .collect())
        }
    }

    // ------------------------------------------------------------------
    // options
    // ------------------------------------------------------------------

    /// Option lookup; admin-flagged keys are visible to admins only.
    pub fn option(&self, key: &str, token: &str) -> AppResult<Value> {
        if self.settings.is_admin(key) {
            self.require_permission(token, Permission::Admin)?;
        }
        Ok(option_value(self.settings.get(key)))
    }

    /// Admin-only option write.
    pub async fn edit_option(&self, key: &str, value: &str, token: &str) -> AppResult<()> {
        self.require_permission(token, Permission::Admin)?;
        self.write_option(key, value).await.map_err(|err| {
            AppError::Error(err.to_string())
        })?;
        Ok(())
    }

    /// Store-first option write used by both the facade and startup
    /// migrations; the cache (and its change event) only updates after the
    /// row landed.
    async fn write_option(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        let id = self.settings.id_of(key);
        if id == -1 {
            let id = repositories::settings::insert(&self.pool, key, value).await?;
            self.settings.set_id(key, id);
            tracing::info!(key, id, "added new settings key");
        } else {
            repositories::settings::update(&self.pool, id, key, value).await?;
        }
        self.settings.set(key, value);
        self.plugins.notify(PluginEvent::EditOption(
            key.to_string(),
            Value::String(value.to_string()),
        ));
        Ok(())
    }

    // ------------------------------------------------------------------
    // plugins
    // ------------------------------------------------------------------

    pub fn list_plugins(&self) -> Vec<String> {
        self.plugins.list()
    }

    /// Admin-only plugin load; records the name and rewrites the plugin
    /// list setting.
    pub async fn add_plugin(&self, name: &str, token: &str) -> AppResult<()> {
        self.require_permission(token, Permission::Admin)?;
        if !self.plugins.insert(name) {
            return Err(AppError::Error("Plugin is already loaded".to_string()));
        }
        if let Err(err) = self
            .write_option(
                Settings::canonical_name(SettingKey::Plugins),
                &self.plugins.encoded(),
            )
            .await
        {
            self.plugins.remove(name);
            return Err(AppError::Error(err.to_string()));
        }
        self.plugins.notify(PluginEvent::AddPlugin(name.to_string()));
        Ok(())
    }

    /// Admin-only plugin unload.
    pub async fn remove_plugin(&self, name: &str, token: &str) -> AppResult<()> {
        self.require_permission(token, Permission::Admin)?;
        if !self.plugins.remove(name) {
            return Err(AppError::Error("Plugin is not loaded".to_string()));
        }
        if let Err(err) = self
            .write_option(
                Settings::canonical_name(SettingKey::Plugins),
                &self.plugins.encoded(),
            )
            .await
        {
            self.plugins.insert(name);
            return Err(AppError::Error(err.to_string()));
        }
        self.plugins
            .notify(PluginEvent::RemovePlugin(name.to_string()));
        Ok(())
    }

    /// Option map for one plugin, assembled from its `Plugin.<name>.*`
    /// settings rows; admin-only like every plugin operation.
    pub async fn plugin_options(
        &self,
        name: &str,
        token: &str,
    ) -> AppResult<BTreeMap<String, String>> {
        self.require_permission(token, Permission::Admin)?;
        let rows = repositories::settings::plugin_options(&self.pool, name)
            .await
            .map_err(|err| AppError::Error(err.to_string()))?;
        let prefix = format!("Plugin.{name}.");
        Ok(rows
            .into_iter()
            .map(|row| {
                let key = row
                    .key
                    .strip_prefix(&prefix)
                    .unwrap_or(&row.key)
                    .to_string();
                (key, row.value.unwrap_or_default())
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // status
    // ------------------------------------------------------------------

    /// Build and runtime metadata as sorted sections of sorted keys.
    pub fn status(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut sections = BTreeMap::new();
        sections.insert(
            "api".to_string(),
            BTreeMap::from([("version".to_string(), "1".to_string())]),
        );
        sections.insert(
            "daemon".to_string(),
            BTreeMap::from([
                ("admin".to_string(), self.admin_name.clone()),
                (
                    "version".to_string(),
                    env!("CARGO_PKG_VERSION").to_string(),
                ),
            ]),
        );
        sections.insert(
            "host".to_string(),
            BTreeMap::from([
                ("cpu".to_string(), self.host.cpu.to_string()),
                ("memory".to_string(), self.host.memory.to_string()),
            ]),
        );
        sections
    }

    // ------------------------------------------------------------------
    // event loop
    // ------------------------------------------------------------------

    fn spawn_event_loop(core: Arc<Core>, mut rx: mpsc::UnboundedReceiver<CoreEvent>) {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                core.handle_event(event).await;
            }
        });
    }

    async fn handle_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::TaskStarted { id, time } => {
                let stamp = time::to_timestamp(time);
                if let Err(err) =
                    repositories::tasks::set_start_time(&self.pool, id, &stamp).await
                {
                    tracing::warn!(id, %err, "could not record task start time");
                }
                self.plugins.notify(PluginEvent::StartTask(id));
            }
            CoreEvent::TaskFinished { id, time } => {
                let stamp = time::to_timestamp(time);
                if let Err(err) = repositories::tasks::set_end_time(&self.pool, id, &stamp).await
                {
                    tracing::warn!(id, %err, "could not record task end time");
                }
                self.plugins.notify(PluginEvent::StopTask(id));
            }
            CoreEvent::UserLoggedIn { id, time } => {
                let stamp = time::to_timestamp(time);
                if let Err(err) =
                    repositories::users::set_last_login(&self.pool, id, &stamp).await
                {
                    tracing::warn!(id, %err, "could not record login time");
                }
            }
            CoreEvent::TokenExpired { token } => {
                if let Err(err) = repositories::tokens::remove_by_value(&self.pool, &token).await
                {
                    tracing::warn!(%err, "could not drop expired token row");
                }
            }
            CoreEvent::SettingChanged { key, name, value } => {
                self.apply_setting(key, &name, &value);
            }
        }
    }

    fn apply_setting(&self, key: SettingKey, name: &str, value: &str) {
        match key {
            SettingKey::DatabaseInterval => {
                if let Ok(interval) = value.parse() {
                    self.retention
                        .send_modify(|settings| settings.interval_ms = interval);
                }
            }
            SettingKey::KeepTasks => {
                if let Ok(keep) = value.parse() {
                    self.retention
                        .send_modify(|settings| settings.keep_tasks_ms = keep);
                }
            }
            SettingKey::KeepUsers => {
                if let Ok(keep) = value.parse() {
                    self.retention
                        .send_modify(|settings| settings.keep_users_ms = keep);
                }
            }
            SettingKey::OnExitAction => {
                if let Ok(action) = value.parse() {
                    self.scheduler
                        .set_exit_action(ExitAction::from_setting(action));
                }
            }
            SettingKey::TokenExpiration => {
                if let Ok(days) = value.parse() {
                    self.users.set_token_expiration(days);
                }
            }
            _ => {
                tracing::trace!(name, "no component reconfiguration for setting");
            }
        }
    }
}

/// Numbers come back as numbers, everything else as strings.
fn option_value(raw: String) -> Value {
    match raw.parse::<i64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::String(raw),
    }
}
