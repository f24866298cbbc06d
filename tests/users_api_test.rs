mod common;

use axum::http::Method;
use common::{data, response_json, TestApp, TEST_PASSWORD};
use k_to_drinks_api::entities::user::UserRole;
use serde_json::json;

fn new_user_body(username: &str) -> serde_json::Value {
    json!({
        "username": username,
        "email": format!("{}@ktodrinks.test", username),
        "password": "a-long-enough-password",
        "first_name": "Maria",
        "last_name": "Reyes",
        "role": "delivery_driver"
    })
}

#[tokio::test]
async fn only_admin_creates_users() {
    let app = TestApp::new().await;

    let response = app
        .as_manager(Method::POST, "/api/v1/users", Some(new_user_body("mreyes")))
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .as_admin(Method::POST, "/api/v1/users", Some(new_user_body("mreyes")))
        .await;
    assert_eq!(response.status(), 201);
    let user = data(response).await;
    assert_eq!(user["username"], "mreyes");
    assert_eq!(user["role"], "delivery_driver");
    assert_eq!(user["status"], "active");
    assert!(user["profile"].is_object(), "profile created with the user");
    assert!(user.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(Method::POST, "/api/v1/users", Some(new_user_body("manager")))
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn short_password_fails_validation() {
    let app = TestApp::new().await;

    let mut body = new_user_body("shorty");
    body["password"] = json!("short");
    let response = app.as_admin(Method::POST, "/api/v1/users", Some(body)).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn non_admin_cannot_update_other_users() {
    let app = TestApp::new().await;

    let response = app
        .as_manager(
            Method::PUT,
            &format!("/api/v1/users/{}", app.driver.id()),
            Some(json!({"first_name": "Hijacked"})),
        )
        .await;
    assert_eq!(response.status(), 403);

    // Own account is fine
    let response = app
        .as_driver(
            Method::PUT,
            &format!("/api/v1/users/{}", app.driver.id()),
            Some(json!({"first_name": "Pedro", "phone_number": "0917-000-1111"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    let user = data(response).await;
    assert_eq!(user["first_name"], "Pedro");
    assert_eq!(user["phone_number"], "0917-000-1111");
}

#[tokio::test]
async fn role_change_requires_admin() {
    let app = TestApp::new().await;
    let path = format!("/api/v1/users/{}", app.driver.id());

    let response = app
        .as_driver(Method::PUT, &path, Some(json!({"role": "admin"})))
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .as_admin(Method::PUT, &path, Some(json!({"role": "manager"})))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(data(response).await["role"], "manager");
}

#[tokio::test]
async fn delete_archives_instead_of_removing() {
    let app = TestApp::new().await;
    let extra = app.create_user("temp", UserRole::DeliveryDriver).await;
    let path = format!("/api/v1/users/{}", extra.id());

    let response = app.as_admin(Method::DELETE, &path, None).await;
    assert_eq!(response.status(), 200);

    let response = app.as_admin(Method::GET, &path, None).await;
    assert_eq!(response.status(), 200);
    let user = data(response).await;
    assert_eq!(user["status"], "archived");
    assert_eq!(user["is_active"], false);
}

#[tokio::test]
async fn list_filters_by_role_and_search() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(Method::GET, "/api/v1/users?role=delivery_driver", None)
        .await;
    assert_eq!(response.status(), 200);
    let page = data(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["username"], "driver");

    let response = app
        .as_admin(Method::GET, "/api/v1/users?search=mana", None)
        .await;
    let page = data(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["username"], "manager");
}

#[tokio::test]
async fn profile_is_readable_and_editable() {
    let app = TestApp::new().await;

    let response = app.as_driver(Method::GET, "/api/v1/users/profile", None).await;
    assert_eq!(response.status(), 200);
    let me = data(response).await;
    assert_eq!(me["id"], app.driver.id().to_string());

    let response = app
        .as_driver(
            Method::PUT,
            "/api/v1/users/profile",
            Some(json!({"bio": "Route 3 driver", "birth_date": "1990-04-12"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    let me = data(response).await;
    assert_eq!(me["profile"]["bio"], "Route 3 driver");
    assert_eq!(me["profile"]["birth_date"], "1990-04-12");
}

#[tokio::test]
async fn change_password_checks_old_password() {
    let app = TestApp::new().await;

    let response = app
        .as_driver(
            Method::POST,
            "/api/v1/users/change-password",
            Some(json!({"old_password": "wrong-one", "new_password": "brand-new-secret"})),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("Old password is incorrect")));

    let response = app
        .as_driver(
            Method::POST,
            "/api/v1/users/change-password",
            Some(json!({"old_password": TEST_PASSWORD, "new_password": "brand-new-secret"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(data(response).await["message"], "Password changed successfully");

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/token",
            Some(json!({"username": "driver", "password": "brand-new-secret"})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
}
