use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::handlers::{missing_fields, str_field};
use crate::state::AppState;

/// `POST /auth`: exchanges credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let user = str_field(&payload, "user").ok_or_else(missing_fields)?;
    let password = str_field(&payload, "password").ok_or_else(missing_fields)?;

    let token = state.core.auth(&user, &password).await?;
    Ok(Json(json!({"code": 200, "token": token})))
}
