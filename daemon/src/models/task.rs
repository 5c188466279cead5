//! Task rows, submission payloads and the partial-edit shape.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::limits::Limits;

/// Lifecycle of a task, derived from its recorded timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Finished,
}

/// Database representation of a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    /// Unique task identifier.
    #[sqlx(rename = "_id")]
    #[serde(rename = "_id")]
    pub id: i64,
    /// Identifier of the owning user.
    pub user: i64,
    /// Program to run.
    pub command: Option<String>,
    /// Program arguments, LF-joined in storage order.
    #[sqlx(rename = "commandArguments")]
    #[serde(rename = "commandArguments")]
    pub command_arguments: Option<String>,
    /// Working directory; empty means the system temp location.
    #[sqlx(rename = "workDirectory")]
    #[serde(rename = "workDirectory")]
    pub work_directory: Option<String>,
    /// Scheduling priority, lower runs first.
    pub nice: i64,
    /// System user the child runs as.
    pub uid: Option<i64>,
    /// System group the child runs as.
    pub gid: Option<i64>,
    /// Encoded resource limits.
    pub limits: Option<String>,
    #[sqlx(rename = "startTime")]
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[sqlx(rename = "endTime")]
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
}

impl TaskRow {
    pub fn state(&self) -> TaskState {
        match (&self.start_time, &self.end_time) {
            (None, _) => TaskState::Pending,
            (Some(_), None) => TaskState::Running,
            (Some(_), Some(_)) => TaskState::Finished,
        }
    }

    pub fn native_limits(&self) -> Limits {
        Limits::parse(self.limits.as_deref().unwrap_or_default())
    }

    pub fn arguments(&self) -> Vec<String> {
        self.command_arguments
            .as_deref()
            .unwrap_or_default()
            .split('\n')
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Fully resolved task definition, ready to insert.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user: i64,
    pub command: String,
    pub command_arguments: String,
    pub work_directory: String,
    pub nice: i64,
    pub uid: i64,
    pub gid: i64,
    pub limits: String,
}

/// Partial edit of a task row. `None` fields are left untouched. Fields that
/// only administrators may change are stripped for everyone else by
/// [`drop_admin_fields`](TaskPatch::drop_admin_fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub user: Option<i64>,
    pub command: Option<String>,
    pub command_arguments: Option<String>,
    pub work_directory: Option<String>,
    pub nice: Option<i64>,
    pub uid: Option<i64>,
    pub gid: Option<i64>,
    pub limits: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl TaskPatch {
    /// Projection applied to non-admin callers: only the command line,
    /// working directory and limits survive.
    pub fn drop_admin_fields(&self) -> TaskPatch {
        TaskPatch {
            command: self.command.clone(),
            command_arguments: self.command_arguments.clone(),
            work_directory: self.work_directory.clone(),
            limits: self.limits.clone(),
            ..TaskPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.command.is_none()
            && self.command_arguments.is_none()
            && self.work_directory.is_none()
            && self.nice.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
            && self.limits.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}
