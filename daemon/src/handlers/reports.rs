use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::handlers::{query_to_value, time_field};
use crate::middleware::BearerToken;
use crate::state::AppState;

/// `GET /reports?from=..&to=..`: per-user usage over the window.
pub async fn performance(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Value>> {
    let data = query_to_value(&query);
    let from = time_field(&data, "from")?;
    let to = time_field(&data, "to")?;

    let report = state.core.performance_report(from, to, &token).await?;
    Ok(Json(json!({"code": 200, "report": report})))
}
