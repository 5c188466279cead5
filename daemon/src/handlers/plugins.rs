use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::handlers::ok;
use crate::middleware::BearerToken;
use crate::state::AppState;

/// `GET /plugins`: loaded plugin names.
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Value>> {
    Ok(Json(
        json!({"code": 200, "plugins": state.core.list_plugins()}),
    ))
}

/// `GET /plugin/{name}`: the plugin's stored option map.
pub async fn options(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let options = state.core.plugin_options(&name, &token).await?;
    Ok(Json(json!({"code": 200, "options": options})))
}

/// `POST /plugin/{name}`: loads the plugin.
pub async fn add(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    state.core.add_plugin(&name, &token).await?;
    Ok(ok())
}

/// `DELETE /plugin/{name}`: unloads the plugin.
pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    state.core.remove_plugin(&name, &token).await?;
    Ok(ok())
}
