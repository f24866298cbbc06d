//! Token issue, refresh and bearer validation.

mod common;

use axum::http::Method;
use common::{data, response_json, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_issues_bearer_token_pair() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token",
            Some(json!({"username": "manager", "password": TEST_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["expires_in"].as_i64().is_some_and(|s| s > 0));

    // The issued token is accepted by a protected endpoint
    let token = body["access_token"].as_str().unwrap().to_string();
    let response = app
        .request(Method::GET, "/api/v1/stores", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token",
            Some(json!({"username": "manager", "password": "not-the-password"})),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn archived_user_cannot_log_in() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(
            Method::POST,
            &format!("/api/v1/users/{}/archive", app.driver.id()),
            Some(json!({"archive": true})),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token",
            Some(json!({"username": "driver", "password": TEST_PASSWORD})),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn refresh_token_rotates_pair() {
    let app = TestApp::new().await;

    let login = response_json(
        app.request(
            Method::POST,
            "/api/v1/auth/token",
            Some(json!({"username": "admin", "password": TEST_PASSWORD})),
            None,
        )
        .await,
    )
    .await;
    let refresh = login["refresh_token"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token/refresh",
            Some(json!({"refresh_token": refresh})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_ne!(body["refresh_token"].as_str(), Some(refresh));

    // The old refresh token is spent
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token/refresh",
            Some(json!({"refresh_token": refresh})),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_MISSING");
}

#[tokio::test]
async fn malformed_and_invalid_tokens_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not.a.jwt"))
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");

    let request = axum::http::Request::builder()
        .uri("/api/v1/orders")
        .header("authorization", "Token abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(
        k_to_drinks_api::build_router(app.state.clone(), app.auth_service.clone()),
        request,
    )
    .await
    .unwrap();
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_FORMAT");
}

#[tokio::test]
async fn driver_lacks_write_permissions() {
    let app = TestApp::new().await;

    let response = app
        .as_driver(
            Method::POST,
            "/api/v1/stores",
            Some(json!({
                "name": "Blocked",
                "location": "Nowhere",
                "owner_name": "Nobody",
                "number": "000",
                "day": "Friday"
            })),
        )
        .await;
    assert_eq!(response.status(), 403);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INSUFFICIENT_PERMISSIONS");

    // Reads are allowed
    let response = app.as_driver(Method::GET, "/api/v1/stores", None).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn public_endpoints_need_no_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), 200);
    assert_eq!(data(response).await["status"], "ok");

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["database"]["status"], "up");

    let response = app.request(Method::GET, "/", None, None).await;
    assert_eq!(response.status(), 200);
}
