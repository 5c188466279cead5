use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::handlers::{missing_fields, ok, str_field};
use crate::middleware::BearerToken;
use crate::models::permissions::Permission;
use crate::state::AppState;

fn parse_permission(payload: &Value) -> AppResult<Permission> {
    let name = str_field(payload, "permission").ok_or_else(missing_fields)?;
    let permission = Permission::from_name(&name);
    if permission == Permission::Invalid {
        return Err(AppError::InvalidArgument("Invalid permission".to_string()));
    }
    Ok(permission)
}

/// `POST /permissions/{id}`: grants one permission; body `{permission}`.
pub async fn add(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let permission = parse_permission(&payload)?;
    state
        .core
        .edit_user_permission(id, permission, true, &token)
        .await?;
    Ok(ok())
}

/// `DELETE /permissions/{id}`: revokes one permission; body `{permission}`.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let permission = parse_permission(&payload)?;
    state
        .core
        .edit_user_permission(id, permission, false, &token)
        .await?;
    Ok(ok())
}
