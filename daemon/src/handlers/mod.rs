pub mod auth;
pub mod option;
pub mod permissions;
pub mod plugins;
pub mod reports;
pub mod status;
pub mod task;
pub mod user;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::require_json;
use crate::models::limits::{convert_memory, Limits};
use crate::state::AppState;
use crate::utils::time;

/// The complete HTTP surface under `/api/v1`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/auth", post(auth::login))
        .route(
            "/api/v1/option/{key}",
            get(option::get_option).post(option::set_option),
        )
        .route(
            "/api/v1/permissions/{id}",
            post(permissions::add).delete(permissions::remove),
        )
        .route(
            "/api/v1/plugin/{name}",
            get(plugins::options)
                .post(plugins::add)
                .delete(plugins::remove),
        )
        .route("/api/v1/plugins", get(plugins::list))
        .route("/api/v1/reports", get(reports::performance))
        .route("/api/v1/status", get(status::status))
        .route("/api/v1/task", post(task::add))
        .route(
            "/api/v1/task/{id}",
            get(task::get_task).post(task::edit).put(task::toggle),
        )
        .route("/api/v1/tasks", get(task::list))
        .route(
            "/api/v1/user/{name}",
            get(user::get_user).post(user::add_or_edit),
        )
        .route("/api/v1/users", get(user::list))
        .fallback(not_found)
        .layer(axum_middleware::from_fn(require_json))
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"code": 404, "message": "Unknown resource"})),
    )
}

/// Standard success envelope.
pub(crate) fn ok() -> Json<Value> {
    Json(json!({"code": 200}))
}

pub(crate) fn missing_fields() -> AppError {
    AppError::InvalidArgument("No required fields found".to_string())
}

pub(crate) fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|value| match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

pub(crate) fn i64_field(data: &Value, key: &str) -> Option<i64> {
    data.get(key).and_then(|value| match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    })
}

/// Limit fields accept plain integers and memory literals with K/M/G
/// suffixes.
pub(crate) fn limit_field(data: &Value, key: &str) -> AppResult<Option<i64>> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::InvalidArgument(format!("Invalid value for {key}"))),
        Some(Value::String(text)) => convert_memory(text)
            .map(Some)
            .ok_or_else(|| AppError::InvalidArgument(format!("Invalid value for {key}"))),
        Some(_) => Err(AppError::InvalidArgument(format!(
            "Invalid value for {key}"
        ))),
    }
}

/// Collects the five `limit*` payload fields; `None` when the payload does
/// not touch limits at all.
pub(crate) fn limits_field(data: &Value) -> AppResult<Option<Limits>> {
    let fields = [
        "limitCpu",
        "limitGpu",
        "limitMemory",
        "limitGpumemory",
        "limitStorage",
    ];
    if fields.iter().all(|key| data.get(*key).is_none()) {
        return Ok(None);
    }
    Ok(Some(Limits {
        cpu: limit_field(data, "limitCpu")?.unwrap_or(0),
        gpu: limit_field(data, "limitGpu")?.unwrap_or(0),
        memory: limit_field(data, "limitMemory")?.unwrap_or(0),
        gpumemory: limit_field(data, "limitGpumemory")?.unwrap_or(0),
        storage: limit_field(data, "limitStorage")?.unwrap_or(0),
    }))
}

pub(crate) fn string_list_field(data: &Value, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

pub(crate) fn time_field(data: &Value, key: &str) -> AppResult<Option<DateTime<Utc>>> {
    match str_field(data, key) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => time::parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| AppError::InvalidArgument(format!("Invalid timestamp in {key}"))),
    }
}

/// Query strings share the payload vocabulary of the JSON bodies.
pub(crate) fn query_to_value(query: &std::collections::HashMap<String, String>) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in query {
        map.insert(key.clone(), Value::String(value.clone()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_fields_accept_numbers_and_memory_literals() {
        let data = json!({"limitCpu": 2, "limitMemory": "1G"});
        assert_eq!(limit_field(&data, "limitCpu").unwrap(), Some(2));
        assert_eq!(limit_field(&data, "limitMemory").unwrap(), Some(1 << 30));
        assert_eq!(limit_field(&data, "limitGpu").unwrap(), None);
        assert!(limit_field(&json!({"limitCpu": "junk"}), "limitCpu").is_err());
    }

    #[test]
    fn limits_field_is_none_without_any_limit_key() {
        assert_eq!(limits_field(&json!({"command": "x"})).unwrap(), None);
        let limits = limits_field(&json!({"limitCpu": 4})).unwrap().unwrap();
        assert_eq!(limits.cpu, 4);
        assert_eq!(limits.memory, 0);
    }

    #[test]
    fn string_lists_tolerate_scalar_payloads() {
        assert_eq!(
            string_list_field(&json!({"arguments": ["a", "b"]}), "arguments"),
            vec!["a", "b"]
        );
        assert_eq!(
            string_list_field(&json!({"arguments": "solo"}), "arguments"),
            vec!["solo"]
        );
        assert!(string_list_field(&json!({}), "arguments").is_empty());
    }
}
