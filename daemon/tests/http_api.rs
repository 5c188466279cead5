mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;

use queued_daemon::models::permissions::Permission;

use support::{app, request, test_core, ADMIN_NAME, ADMIN_PASSWORD};

async fn admin_app() -> (axum::Router, String) {
    let core = test_core().await;
    let token = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("token");
    (app(core), token)
}

#[tokio::test]
async fn requests_without_json_content_type_get_415() {
    let (app, _) = admin_app().await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/status")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["code"], 415);
}

#[tokio::test]
async fn unknown_resources_get_404_and_wrong_verbs_405() {
    let (app, token) = admin_app().await;

    let (status, body) = request(&app, Method::GET, "/api/v1/nothing", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, _) = request(&app, Method::DELETE, "/api/v1/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn status_reports_sorted_metadata_sections() {
    let (app, token) = admin_app().await;
    let (status, body) = request(&app, Method::GET, "/api/v1/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["api"]["version"], "1");
    assert_eq!(body["daemon"]["admin"], ADMIN_NAME);
    assert_eq!(body["host"]["cpu"], "4");
}

#[tokio::test]
async fn options_round_trip_over_http() {
    let (app, token) = admin_app().await;

    let (status, body) = request(
        &app,
        Method::GET,
        "/api/v1/option/ServerPort",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 8080);

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/option/ServerPort",
        Some(&token),
        Some(json!({"value": 9090})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/v1/option/ServerPort",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["value"], 9090);

    // Missing the value field is a 400.
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/option/ServerPort",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_options_reject_anonymous_readers() {
    let (app, _) = admin_app().await;
    let (status, _) = request(
        &app,
        Method::GET,
        "/api/v1/option/DatabaseInterval",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn users_and_permissions_flow_over_http() {
    let (app, token) = admin_app().await;

    // Create.
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/v1/user/worker",
        Some(&token),
        Some(json!({"password": "pw", "email": "worker@example.com", "permissions": Permission::Job.bit(), "priority": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().expect("id");

    // Read back.
    let (status, body) = request(
        &app,
        Method::GET,
        "/api/v1/user/worker",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"]["name"], "worker");
    assert_eq!(body["properties"]["email"], "worker@example.com");
    assert!(body["properties"].get("password").is_none());

    // Grant and revoke a permission.
    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/api/v1/permissions/{id}"),
        Some(&token),
        Some(json!({"permission": "reports"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/v1/permissions/{id}"),
        Some(&token),
        Some(json!({"permission": "reports"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/api/v1/permissions/{id}"),
        Some(&token),
        Some(json!({"permission": "nonsense"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Listing users requires a valid token.
    let (status, body) = request(&app, Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["report"]
        .as_array()
        .expect("rows")
        .iter()
        .any(|row| row["name"] == "worker"));
}

#[tokio::test]
async fn tasks_flow_over_http() {
    let (app, token) = admin_app().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/v1/task",
        Some(&token),
        Some(json!({
            "command": "/bin/sleep",
            "arguments": ["0.2"],
            "workingDirectory": std::env::temp_dir().display().to_string(),
            "limitMemory": "1G",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().expect("id");

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/api/v1/task/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"]["command"], "/bin/sleep");
    assert_eq!(body["properties"]["limits"], "0\n0\n1073741824\n0\n0");

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/api/v1/task/{id}?property=command"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"]["command"], "/bin/sleep");

    // Submitting without a command is a 400.
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/task",
        Some(&token),
        Some(json!({"arguments": ["x"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Anonymous task reads are rejected.
    let (status, _) = request(&app, Method::GET, &format!("/api/v1/task/{id}"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plugins_flow_over_http() {
    let (app, token) = admin_app().await;

    let (status, body) = request(&app, Method::GET, "/api/v1/plugins", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["plugins"].as_array().expect("list").is_empty());

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/plugin/notify",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, Method::GET, "/api/v1/plugins", Some(&token), None).await;
    assert_eq!(body["plugins"], json!(["notify"]));

    // Loading twice is an error.
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/v1/plugin/notify",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = request(
        &app,
        Method::DELETE,
        "/api/v1/plugin/notify",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Anonymous plugin management is forbidden.
    let (status, _) = request(&app, Method::POST, "/api/v1/plugin/other", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
