#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use queued_daemon::config::{AdminConfig, DaemonConfig, DatabaseConfig};
use queued_daemon::db::connection::create_pool;
use queued_daemon::handlers;
use queued_daemon::services::core::Core;
use queued_daemon::services::users::hash_password;
use queued_daemon::state::AppState;
use queued_daemon::utils::system::HostResources;

pub const ADMIN_NAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "swordfish";
pub const SALT: &str = "salt";
pub const GIB: i64 = 1024 * 1024 * 1024;

pub fn test_host() -> HostResources {
    HostResources {
        cpu: 4,
        memory: 8 * GIB,
    }
}

pub fn test_config() -> DaemonConfig {
    DaemonConfig {
        administrator: AdminConfig {
            username: ADMIN_NAME.to_string(),
            password: hash_password(ADMIN_PASSWORD, SALT),
            salt: SALT.to_string(),
        },
        database: DatabaseConfig {
            driver: "sqlite".to_string(),
            hostname: String::new(),
            password: String::new(),
            path: ":memory:".to_string(),
            port: 0,
            username: String::new(),
        },
    }
}

pub async fn test_core() -> Arc<Core> {
    test_core_with_host(test_host()).await
}

pub async fn test_core_with_host(host: HostResources) -> Arc<Core> {
    let pool = create_pool("sqlite::memory:").await.expect("pool");
    Core::init(&test_config(), pool, host)
        .await
        .expect("core init")
}

pub fn app(core: Arc<Core>) -> axum::Router {
    handlers::router(AppState::new(core))
}

/// Drives one request through the router; always sends the JSON content
/// type the API demands.
pub async fn request(
    app: &axum::Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-queued-token", token);
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Polls a condition for a few seconds; background work (scheduler starts,
/// event-loop writes) settles quickly but asynchronously.
pub async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
