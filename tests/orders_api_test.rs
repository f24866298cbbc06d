mod common;

use std::str::FromStr;

use axum::{
    body,
    http::{header, Method, StatusCode},
};
use common::{data, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn money(value: &Value) -> Decimal {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Decimal::from_str(&raw).unwrap_or_else(|_| panic!("not a decimal: {}", raw))
}

#[tokio::test]
async fn create_order_computes_totals_with_two_percent_tax() {
    let app = TestApp::new().await;
    let store = app.seed_store("Sari-Sari Aling Nena").await;
    let product = app.seed_product("Cola 1L", "25.00").await;
    app.stock_in(&product, 10).await;

    let order = app.seed_order(&store, &product, 2).await;

    assert_eq!(money(&order["subtotal"]), dec!(50.00));
    assert_eq!(money(&order["tax"]), dec!(1.00));
    assert_eq!(money(&order["total"]), dec!(51.00));
    assert_eq!(order["status"], "pending");
    assert!(order["order_id"].as_str().expect("order_id").starts_with("ORD"));
    assert_eq!(order["store"]["id"], store);
    assert_eq!(order["items"].as_array().expect("items").len(), 1);
    assert_eq!(money(&order["items"][0]["total"]), dec!(50.00));
}

#[tokio::test]
async fn order_lines_draw_stock_and_skip_unknown_products() {
    let app = TestApp::new().await;
    let store = app.seed_store("Corner Store").await;
    let product = app.seed_product("Orange Juice", "40.00").await;
    app.stock_in(&product, 10).await;

    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "store_id": store,
                "order_items": [
                    {"product_id": product, "quantity": 3},
                    {"product_id": uuid::Uuid::new_v4(), "quantity": 5}
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = data(response).await;
    assert_eq!(order["items"].as_array().expect("items").len(), 1);
    // unit price falls back to the product's price
    assert_eq!(money(&order["items"][0]["unit_price"]), dec!(40.00));
    assert_eq!(money(&order["subtotal"]), dec!(120.00));
    assert_eq!(money(&order["total"]), dec!(122.40));

    let response = app
        .as_admin(
            Method::GET,
            &format!(
                "/api/v1/inventory/transactions?product_id={}&transaction_type=out",
                product
            ),
            None,
        )
        .await;
    let txs = data(response).await;
    assert_eq!(txs["total"], 1);
    assert_eq!(txs["items"][0]["new_stock"], 7);
    assert_eq!(txs["items"][0]["reference"], order["order_id"]);
}

#[tokio::test]
async fn create_order_for_unknown_store_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Cola", "25.00").await;

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "store_id": uuid::Uuid::new_v4(),
                "order_items": [{"product_id": product, "quantity": 1}]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.as_admin(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(data(response).await["total"], 0);
}

#[tokio::test]
async fn item_changes_recalculate_order_totals() {
    let app = TestApp::new().await;
    let store = app.seed_store("Tindahan ni Mang Ben").await;
    let cola = app.seed_product("Cola", "25.00").await;
    let water = app.seed_product("Water", "10.00").await;
    app.stock_in(&cola, 50).await;
    app.stock_in(&water, 50).await;

    let order = app.seed_order(&store, &cola, 2).await;
    let order_id = order["id"].as_str().expect("id").to_string();

    let response = app
        .as_admin(
            Method::POST,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({"product_id": water, "quantity": 5})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let water_line = data(response).await;
    let water_item = water_line["id"].as_str().expect("item id").to_string();

    let order = data(
        app.as_admin(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
            .await,
    )
    .await;
    assert_eq!(money(&order["subtotal"]), dec!(100.00));
    assert_eq!(money(&order["total"]), dec!(102.00));

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/items/{}", order_id, water_item),
            Some(json!({"quantity": 1, "unit_price": "12.50"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(money(&data(response).await["total"]), dec!(12.50));

    let order = data(
        app.as_admin(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
            .await,
    )
    .await;
    assert_eq!(money(&order["subtotal"]), dec!(62.50));
    assert_eq!(money(&order["tax"]), dec!(1.25));
    assert_eq!(money(&order["total"]), dec!(63.75));

    let response = app
        .as_admin(
            Method::DELETE,
            &format!("/api/v1/orders/{}/items/{}", order_id, water_item),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let items = data(
        app.as_admin(
            Method::GET,
            &format!("/api/v1/orders/{}/items", order_id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(items.as_array().expect("items").len(), 1);

    let order = data(
        app.as_admin(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
            .await,
    )
    .await;
    assert_eq!(money(&order["total"]), dec!(51.00));
}

#[tokio::test]
async fn item_quantity_below_one_is_rejected() {
    let app = TestApp::new().await;
    let store = app.seed_store("Quantity Store").await;
    let product = app.seed_product("Cola", "25.00").await;
    app.stock_in(&product, 5).await;
    let order = app.seed_order(&store, &product, 1).await;
    let item_id = order["items"][0]["id"].as_str().expect("item id");

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/items/{}", order["id"].as_str().expect("id"), item_id),
            Some(json!({"quantity": 0})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_order_replaces_items_and_filters_by_status() {
    let app = TestApp::new().await;
    let store = app.seed_store("Replace Store").await;
    let cola = app.seed_product("Cola", "25.00").await;
    let juice = app.seed_product("Juice", "30.00").await;
    app.stock_in(&cola, 20).await;
    app.stock_in(&juice, 20).await;

    let order = app.seed_order(&store, &cola, 4).await;
    let order_id = order["id"].as_str().expect("id").to_string();

    let response = app
        .as_admin(
            Method::PUT,
            &format!("/api/v1/orders/{}", order_id),
            Some(json!({
                "status": "completed",
                "notes": "Paid in cash",
                "order_items": [{"product_id": juice, "quantity": 1, "unit_price": "30.00"}]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = data(response).await;
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["notes"], "Paid in cash");
    assert_eq!(updated["items"].as_array().expect("items").len(), 1);
    assert_eq!(money(&updated["total"]), dec!(30.60));

    app.seed_order(&store, &cola, 1).await;

    let response = app
        .as_admin(Method::GET, "/api/v1/orders?status=completed", None)
        .await;
    let listed = data(response).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], order_id);

    let response = app
        .as_admin(Method::GET, &format!("/api/v1/orders?store_id={}", store), None)
        .await;
    assert_eq!(data(response).await["total"], 2);
}

#[tokio::test]
async fn receipt_and_pdf_render_for_an_order() {
    let app = TestApp::new().await;
    let store = app.seed_store("Receipt Store").await;
    let product = app.seed_product("Lemon Soda", "25.00").await;
    app.stock_in(&product, 10).await;
    let order = app.seed_order(&store, &product, 2).await;
    let order_id = order["id"].as_str().expect("id").to_string();
    let order_number = order["order_id"].as_str().expect("order number").to_string();

    let response = app
        .as_driver(
            Method::GET,
            &format!("/api/v1/orders/{}/receipt", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = data(response).await;
    assert_eq!(receipt["order_id"], order_number);
    assert_eq!(receipt["store"]["name"], "Receipt Store");
    assert_eq!(receipt["store"]["contact"], "0917-555-0101");
    assert_eq!(receipt["items"][0]["product"], "Lemon Soda");
    assert_eq!(receipt["items"][0]["size"], "1L");
    assert_eq!(money(&receipt["subtotal"]), dec!(50.00));
    assert_eq!(money(&receipt["tax"]), dec!(1.00));
    assert_eq!(money(&receipt["total"]), dec!(51.00));

    let response = app
        .as_admin(Method::GET, &format!("/api/v1/orders/{}/pdf", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().expect("header"),
        "application/pdf"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("header")
        .to_string();
    assert!(disposition.contains(&format!("order_{}.pdf", order_number)));
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("pdf bytes");
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn driver_cannot_create_or_delete_orders() {
    let app = TestApp::new().await;
    let store = app.seed_store("Guarded Store").await;
    let product = app.seed_product("Cola", "25.00").await;
    app.stock_in(&product, 10).await;

    let response = app
        .as_driver(
            Method::POST,
            "/api/v1/orders",
            Some(json!({"store_id": store, "order_items": []})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let order = app.seed_order(&store, &product, 1).await;
    let order_id = order["id"].as_str().expect("id");

    let response = app
        .as_driver(Method::DELETE, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .as_admin(Method::DELETE, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_admin(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn completing_an_order_records_one_activity() {
    let app = TestApp::new().await;
    let store = app.seed_store("Completion Store").await;
    let cola = app.seed_product("Cola", "25.00").await;
    app.stock_in(&cola, 10).await;
    let order = app.seed_order(&store, &cola, 2).await;
    let number = order["order_id"].as_str().expect("order number").to_string();
    let path = format!("/api/v1/orders/{}", order["id"].as_str().expect("id"));

    let titles = app.activity_titles().await;
    assert_eq!(
        titles.iter().filter(|t| **t == format!("New order {}", number)).count(),
        1
    );

    for _ in 0..2 {
        let response = app
            .as_admin(Method::PUT, &path, Some(json!({"status": "completed"})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let completed = format!("Order {} completed", number);
    let titles = app.activity_titles().await;
    assert_eq!(titles.iter().filter(|t| **t == completed).count(), 1);
    assert_eq!(titles[0], completed);
}

#[tokio::test]
async fn failed_item_replacement_leaves_the_order_untouched() {
    use assert_matches::assert_matches;
    use k_to_drinks_api::{
        entities::order::OrderStatus,
        errors::ServiceError,
        services::orders::{OrderChanges, OrderItemInput},
    };
    use uuid::Uuid;

    let app = TestApp::new().await;
    let store = app.seed_store("Rollback Store").await;
    let cola = app.seed_product("Cola", "25.00").await;
    let juice = app.seed_product("Juice", "30.00").await;
    app.stock_in(&cola, 10).await;
    app.stock_in(&juice, 10).await;
    let order = app.seed_order(&store, &cola, 2).await;
    let id = Uuid::parse_str(order["id"].as_str().expect("id")).expect("uuid");

    // the second line fails after the old lines are gone and the first is in
    let changes = OrderChanges {
        status: Some(OrderStatus::Completed),
        items: Some(vec![
            OrderItemInput {
                product_id: Uuid::parse_str(&juice).expect("uuid"),
                quantity: Some(3),
                unit_price: None,
            },
            OrderItemInput {
                product_id: Uuid::parse_str(&cola).expect("uuid"),
                quantity: Some(0),
                unit_price: None,
            },
        ]),
        ..Default::default()
    };
    let result = app.state.order_service().update_order(id, changes, None).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let response = app
        .as_admin(Method::GET, &format!("/api/v1/orders/{}", id), None)
        .await;
    let current = data(response).await;
    assert_eq!(current["status"], order["status"]);
    let items = current["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], cola.as_str());
    assert_eq!(money(&current["subtotal"]), dec!(50.00));
    assert_eq!(money(&current["total"]), dec!(51.00));

    let response = app
        .as_admin(
            Method::GET,
            &format!("/api/v1/inventory?product_id={}", juice),
            None,
        )
        .await;
    assert_eq!(data(response).await["items"][0]["current_stock"], 10);

    let completed = format!("Order {} completed", order["order_id"].as_str().expect("number"));
    assert!(!app.activity_titles().await.contains(&completed));
}
