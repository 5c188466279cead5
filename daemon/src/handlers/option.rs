use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::handlers::{missing_fields, ok};
use crate::middleware::BearerToken;
use crate::state::AppState;

/// `GET /option/{key}`: single option lookup.
pub async fn get_option(
    State(state): State<AppState>,
    Path(key): Path<String>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let value = state.core.option(&key, &token)?;
    Ok(Json(json!({"code": 200, "value": value})))
}

/// `POST /option/{key}`: single option write; body `{value}`.
pub async fn set_option(
    State(state): State<AppState>,
    Path(key): Path<String>,
    BearerToken(token): BearerToken,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let value = match payload.get("value") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => return Err(missing_fields()),
    };
    state.core.edit_option(&key, &value, &token).await?;
    Ok(ok())
}
