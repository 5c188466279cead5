use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::handlers::{
    i64_field, limits_field, missing_fields, ok, query_to_value, str_field, time_field,
};
use crate::middleware::BearerToken;
use crate::models::permissions::Permission;
use crate::models::user::UserPatch;
use crate::services::core::UserSubmission;
use crate::state::AppState;

/// `GET /user/{name}`: the user row, or a single property when
/// `?property=<name>` is given.
pub async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let row = state.core.user(&name, &token).await?;
    let properties =
        serde_json::to_value(&row).map_err(|err| AppError::Error(err.to_string()))?;

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

/// `POST /user/{name}`: creates the user when the name is unknown,
/// otherwise applies a partial edit.
pub async fn add_or_edit(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    match state.core.users.by_name(&name) {
        Some(existing) => {
            let patch = UserPatch {
                password: str_field(&payload, "password")
                    .map(|password| state.core.hash_password(&password)),
                email: str_field(&payload, "email"),
                permissions: i64_field(&payload, "permissions"),
                priority: i64_field(&payload, "priority"),
                limits: limits_field(&payload)?.map(|limits| limits.encode()),
                ..UserPatch::default()
            };
            state.core.edit_user(existing.id, patch, &token).await?;
            Ok(ok())
        }
        None => {
            let password = str_field(&payload, "password").ok_or_else(missing_fields)?;
            let submission = UserSubmission {
                name,
                email: str_field(&payload, "email").unwrap_or_default(),
                password,
                permissions: i64_field(&payload, "permissions").unwrap_or(0),
                priority: i64_field(&payload, "priority").unwrap_or(0),
                limits: limits_field(&payload)?.unwrap_or_default(),
            };
            let id = state.core.add_user(submission, &token).await?;
            Ok(Json(json!({"code": 200, "id": id})))
        }
    }
}

/// `GET /users?lastLogged=..&permission=..`: filtered user listing.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let data = query_to_value(&query);
    let last_logged = time_field(&data, "lastLogged")?;
    let permission = str_field(&data, "permission")
        .map(|name| Permission::from_name(&name))
        .filter(|permission| *permission != Permission::Invalid);

    let report = state
        .core
        .user_report(last_logged, permission, &token)
        .await?;
    Ok(Json(json!({"code": 200, "report": report})))
}
