mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;

use queued_daemon::models::permissions::Permission;
use queued_daemon::repositories;

use support::{app, request, test_core, ADMIN_NAME, ADMIN_PASSWORD};

#[tokio::test]
async fn fresh_store_gets_a_super_admin_user() {
    let core = test_core().await;
    let row = repositories::users::by_name(core.pool(), ADMIN_NAME)
        .await
        .expect("select")
        .expect("admin row");
    assert_eq!(row.permissions, Permission::SuperAdmin.bit() as i64);

    let all = repositories::users::list(core.pool()).await.expect("list");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn admin_can_authorize_with_the_configured_password() {
    let core = test_core().await;

    let token = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("token");
    assert!(!token.is_empty());
    assert!(core.authorization(&token));

    let err = core.auth(ADMIN_NAME, "x").await.expect_err("bad password");
    assert_eq!(err.to_string(), "Invalid username or password");
}

#[tokio::test]
async fn login_persists_the_token_and_the_login_time() {
    let core = test_core().await;
    let token = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("token");

    let rows = repositories::tokens::list(core.pool()).await.expect("list");
    assert!(rows.iter().any(|row| row.token == token));

    // The login timestamp lands through the event loop.
    assert!(
        support::wait_until(|| async {
            repositories::users::by_name(core.pool(), ADMIN_NAME)
                .await
                .ok()
                .flatten()
                .map(|row| row.last_login.is_some())
                .unwrap_or(false)
        })
        .await
    );
}

#[tokio::test]
async fn http_auth_round_trip() {
    let core = test_core().await;
    let app = app(core);

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({"user": ADMIN_NAME, "password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert!(body["token"].as_str().map(|t| !t.is_empty()).unwrap_or(false));

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({"user": ADMIN_NAME, "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username or password");

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({"user": ADMIN_NAME})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schema_bootstrap_survives_a_second_init() {
    let core = test_core().await;
    // Re-running the bootstrap against the same pool must keep the single
    // administrator row and every table readable.
    queued_daemon::db::schema::ensure_schema(core.pool())
        .await
        .expect("second bootstrap");
    let users = repositories::users::list(core.pool()).await.expect("users");
    assert_eq!(users.len(), 1);
}
