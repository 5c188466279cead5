use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::handlers::{
    i64_field, limits_field, missing_fields, ok, query_to_value, str_field, string_list_field,
    time_field,
};
use crate::middleware::BearerToken;
use crate::models::task::{TaskPatch, TaskState};
use crate::services::core::TaskSubmission;
use crate::state::AppState;
use crate::utils::time;

/// `GET /task/{id}`: the full row, or a single property when
/// `?property=<name>` is given.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let row = state.core.task(id, &token).await?;
    let properties = serde_json::to_value(&row)
        .map_err(|err| AppError::Error(err.to_string()))?;

    let output = match query.get("property") {
        Some(property) => {
            let value = properties.get(property).cloned().unwrap_or(Value::Null);
            let mut single = serde_json::Map::new();
            single.insert(property.clone(), value);
            Value::Object(single)
        }
        None => properties,
    };
    Ok(Json(json!({"code": 200, "properties": output})))
}

fn submission_from(payload: &Value) -> AppResult<TaskSubmission> {
    let command = str_field(payload, "command").ok_or_else(missing_fields)?;
    Ok(TaskSubmission {
        command,
        arguments: string_list_field(payload, "arguments"),
        working_directory: str_field(payload, "workingDirectory"),
        user: i64_field(payload, "user"),
        nice: i64_field(payload, "nice").unwrap_or(0),
        limits: limits_field(payload)?.unwrap_or_default(),
    })
}

fn patch_from(payload: &Value) -> AppResult<TaskPatch> {
    let arguments = payload
        .get("arguments")
        .map(|_| string_list_field(payload, "arguments").join("\n"));
    Ok(TaskPatch {
        user: i64_field(payload, "user"),
        command: str_field(payload, "command"),
        command_arguments: arguments,
        work_directory: str_field(payload, "workingDirectory"),
        nice: i64_field(payload, "nice"),
        uid: i64_field(payload, "uid"),
        gid: i64_field(payload, "gid"),
        limits: limits_field(payload)?.map(|limits| limits.encode()),
        start_time: time_field(payload, "start")?.map(time::to_timestamp),
        end_time: time_field(payload, "end")?.map(time::to_timestamp),
    })
}

/// `POST /task`: submits a new task.
pub async fn add(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let submission = submission_from(&payload)?;
    let id = state.core.add_task(submission, &token).await?;
    Ok(Json(json!({"code": 200, "id": id})))
}

/// `POST /task/{id}`: partial edit of an existing task.
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let patch = patch_from(&payload)?;
    state.core.edit_task(id, patch, &token).await?;
    Ok(ok())
}

/// `PUT /task/{id}`: toggles the task; pending and finished tasks start,
/// running tasks stop.
pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let row = state.core.task(id, &token).await?;
    match row.state() {
        TaskState::Running => state.core.stop_task(id, &token).await?,
        TaskState::Pending | TaskState::Finished => state.core.start_task(id, &token).await?,
    }
    Ok(ok())
}

/// `GET /tasks?userId=..&start=..&stop=..`: filtered task listing.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let data = query_to_value(&query);
    let user = i64_field(&data, "userId");
    let from = time_field(&data, "start")?;
    let to = time_field(&data, "stop")?;

    let report = state.core.task_report(user, from, to, &token).await?;
    Ok(Json(json!({"code": 200, "report": report})))
}
