use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

/// `GET /status`: build and runtime metadata, sections and keys sorted.
pub async fn status(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let mut output = json!({"code": 200});
    for (section, data) in state.core.status() {
        output[section.as_str()] = json!(data);
    }
    Ok(Json(output))
}
