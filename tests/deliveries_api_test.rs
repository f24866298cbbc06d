mod common;

use axum::http::{Method, StatusCode};
use common::{data, response_json, TestApp};
use k_to_drinks_api::entities::user::UserRole;
use serde_json::{json, Value};

const SIGNATURE_PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

/// Seeds a store, a stocked product and an order; returns the order's id.
async fn seed_order_id(app: &TestApp, store_name: &str) -> String {
    let store = app.seed_store(store_name).await;
    let product = app.seed_product("Cola", "25.00").await;
    app.stock_in(&product, 10).await;
    let order = app.seed_order(&store, &product, 2).await;
    order["id"].as_str().expect("order id").to_string()
}

async fn create_delivery(app: &TestApp, body: Value) -> Value {
    let response = app
        .as_manager(Method::POST, "/api/v1/deliveries", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "create delivery");
    data(response).await
}

async fn status_updates(app: &TestApp, delivery_id: &str) -> Vec<Value> {
    let response = app
        .as_admin(
            Method::GET,
            &format!("/api/v1/deliveries/{}/status-updates", delivery_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    data(response).await.as_array().expect("array").clone()
}

#[tokio::test]
async fn create_delivery_records_initial_status_update() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "First Stop").await;

    let delivery = create_delivery(
        &app,
        json!({
            "order_id": order_id,
            "employee_id": app.driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "09:30",
            "notes": "Back entrance"
        }),
    )
    .await;

    assert_eq!(delivery["status"], "pending");
    assert_eq!(delivery["delivery_time"], "09:30");
    assert_eq!(delivery["has_signature"], false);
    assert_eq!(delivery["order"]["id"], order_id);
    assert_eq!(delivery["store"]["name"], "First Stop");
    assert_eq!(delivery["employee"]["id"], app.driver.id().to_string());
    assert!(delivery["delivery_id"]
        .as_str()
        .expect("delivery number")
        .starts_with("DEL"));

    let id = delivery["id"].as_str().expect("id");
    let updates = status_updates(&app, id).await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["status"], "pending");
    assert_eq!(updates[0]["notes"], "Delivery created");
}

#[tokio::test]
async fn second_delivery_for_same_order_conflicts() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Only Once").await;
    let body = json!({
        "order_id": order_id,
        "delivery_date": "2026-10-20",
        "delivery_time": "10:00:00"
    });

    create_delivery(&app, body.clone()).await;
    let response = app
        .as_manager(Method::POST, "/api/v1/deliveries", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn employee_must_be_an_active_driver() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Wrong Driver").await;

    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "order_id": order_id,
                "employee_id": app.manager.id(),
                "delivery_date": "2026-10-20",
                "delivery_time": "10:00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "order_id": order_id,
                "delivery_date": "2026-10-20",
                "delivery_time": "quarter past ten"
            })),
        )
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn status_changes_are_tracked_once_per_transition() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Tracked Stop").await;
    let delivery = create_delivery(
        &app,
        json!({
            "order_id": order_id,
            "employee_id": app.driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "11:15"
        }),
    )
    .await;
    let id = delivery["id"].as_str().expect("id").to_string();
    let uri = format!("/api/v1/deliveries/{}/update-status", id);

    let response = app
        .as_driver(
            Method::POST,
            &uri,
            Some(json!({"status": "in-transit", "notes": "Left the warehouse"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(data(response).await["status"], "in-transit");

    // same status again adds nothing to the trail
    let response = app
        .as_driver(Method::POST, &uri, Some(json!({"status": "in-transit"})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_driver(Method::POST, &uri, Some(json!({"status": "delivered"})))
        .await;
    assert_eq!(data(response).await["status"], "delivered");

    let updates = status_updates(&app, &id).await;
    let trail: Vec<&str> = updates
        .iter()
        .filter_map(|u| u["status"].as_str())
        .collect();
    assert_eq!(trail, vec!["delivered", "in-transit", "pending"]);
    assert_eq!(updates[1]["notes"], "Left the warehouse");
    assert_eq!(updates[0]["updated_by"], app.driver.id().to_string());
}

#[tokio::test]
async fn signature_requires_delivered_status_and_data() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Signature Stop").await;
    let delivery = create_delivery(
        &app,
        json!({
            "order_id": order_id,
            "employee_id": app.driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "13:00"
        }),
    )
    .await;
    let id = delivery["id"].as_str().expect("id").to_string();
    let signature_uri = format!("/api/v1/deliveries/{}/signature", id);

    let response = app
        .as_driver(
            Method::POST,
            &signature_uri,
            Some(json!({"signature_data": SIGNATURE_PNG})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .as_driver(
            Method::POST,
            &format!("/api/v1/deliveries/{}/update-status", id),
            Some(json!({"status": "delivered"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_driver(Method::POST, &signature_uri, Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .expect("message")
        .ends_with("No signature provided."));

    let response = app
        .as_driver(
            Method::POST,
            &signature_uri,
            Some(json!({"signature_data": "data:image/png;base64,***"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .as_driver(
            Method::POST,
            &signature_uri,
            Some(json!({"signature_data": SIGNATURE_PNG})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let signed = data(response).await;
    assert_eq!(signed["has_signature"], true);
    let path = signed["signature_path"].as_str().expect("path");
    assert!(path.ends_with(".png"));
    assert!(!path.starts_with('/'));
}

#[tokio::test]
async fn routes_require_a_date_and_order_by_time() {
    let app = TestApp::new().await;
    let early = seed_order_id(&app, "Early Stop").await;
    let late = seed_order_id(&app, "Late Stop").await;
    let other_day = seed_order_id(&app, "Tomorrow Stop").await;

    create_delivery(
        &app,
        json!({"order_id": late, "delivery_date": "2026-10-20", "delivery_time": "15:45"}),
    )
    .await;
    create_delivery(
        &app,
        json!({
            "order_id": early,
            "delivery_date": "2026-10-20",
            "delivery_time": "08:05",
            "lat": 14.6,
            "lng": 121.0
        }),
    )
    .await;
    create_delivery(
        &app,
        json!({"order_id": other_day, "delivery_date": "2026-10-21", "delivery_time": "09:00"}),
    )
    .await;

    let response = app
        .as_driver(Method::GET, "/api/v1/deliveries/routes", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("delivery_date parameter is required."));

    let response = app
        .as_driver(
            Method::GET,
            "/api/v1/deliveries/routes?delivery_date=2026-10-20",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stops = data(response).await;
    let stops = stops.as_array().expect("stops");
    assert_eq!(stops.len(), 2);
    assert_eq!(stops[0]["store_name"], "Early Stop");
    assert_eq!(stops[0]["delivery_time"], "08:05");
    assert_eq!(stops[0]["lat"], 14.6);
    assert_eq!(stops[1]["store_name"], "Late Stop");
    // no coordinates of its own, so the store's are used
    assert_eq!(stops[1]["lat"], 14.676);
    assert_eq!(stops[1]["address"], "12 Rizal St, Quezon City");
}

#[tokio::test]
async fn drivers_only_see_their_own_deliveries() {
    let app = TestApp::new().await;
    let other_driver = app.create_user("driver2", UserRole::DeliveryDriver).await;
    let mine = seed_order_id(&app, "My Stop").await;
    let theirs = seed_order_id(&app, "Their Stop").await;

    create_delivery(
        &app,
        json!({
            "order_id": mine,
            "employee_id": app.driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "09:00"
        }),
    )
    .await;
    create_delivery(
        &app,
        json!({
            "order_id": theirs,
            "employee_id": other_driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "10:00"
        }),
    )
    .await;

    let response = app.as_driver(Method::GET, "/api/v1/deliveries", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = data(response).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["store"]["name"], "My Stop");

    // asking for someone else's list still yields only the caller's
    let response = app
        .as_driver(
            Method::GET,
            &format!("/api/v1/deliveries?employee_id={}", other_driver.id()),
            None,
        )
        .await;
    assert_eq!(data(response).await["items"][0]["store"]["name"], "My Stop");

    let response = app.as_manager(Method::GET, "/api/v1/deliveries", None).await;
    assert_eq!(data(response).await["total"], 2);

    let response = app
        .as_manager(Method::GET, "/api/v1/deliveries?status=pending", None)
        .await;
    assert_eq!(data(response).await["total"], 2);
}

#[tokio::test]
async fn update_and_delete_delivery() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Editable Stop").await;
    let delivery = create_delivery(
        &app,
        json!({"order_id": order_id, "delivery_date": "2026-10-20", "delivery_time": "09:00"}),
    )
    .await;
    let id = delivery["id"].as_str().expect("id").to_string();

    let response = app
        .as_manager(
            Method::PUT,
            &format!("/api/v1/deliveries/{}", id),
            Some(json!({
                "employee_id": app.driver.id(),
                "delivery_time": "14:00",
                "notes": "Call ahead"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = data(response).await;
    assert_eq!(updated["delivery_time"], "14:00");
    assert_eq!(updated["notes"], "Call ahead");
    assert_eq!(updated["employee"]["id"], app.driver.id().to_string());

    let response = app
        .as_driver(Method::DELETE, &format!("/api/v1/deliveries/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .as_admin(Method::DELETE, &format!("/api/v1/deliveries/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_admin(Method::GET, &format!("/api/v1/deliveries/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delivery_lifecycle_feeds_the_activity_log() {
    let app = TestApp::new().await;
    let order_id = seed_order_id(&app, "Logged Stop").await;
    let delivery = create_delivery(
        &app,
        json!({
            "order_id": order_id,
            "employee_id": app.driver.id(),
            "delivery_date": "2026-10-20",
            "delivery_time": "13:00"
        }),
    )
    .await;
    let number = delivery["delivery_id"].as_str().expect("delivery number");
    let created = format!("New delivery {}", number);
    let completed = format!("Delivery {} completed", number);

    let titles = app.activity_titles().await;
    assert_eq!(titles[0], created);
    assert!(!titles.contains(&completed));

    let uri = format!(
        "/api/v1/deliveries/{}/update-status",
        delivery["id"].as_str().expect("id")
    );
    for _ in 0..2 {
        let response = app
            .as_driver(Method::POST, &uri, Some(json!({"status": "delivered"})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let titles = app.activity_titles().await;
    assert_eq!(titles.iter().filter(|t| **t == created).count(), 1);
    assert_eq!(titles.iter().filter(|t| **t == completed).count(), 1);
    assert_eq!(titles[0], completed);
}
